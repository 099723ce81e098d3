//! Loads a WSDL 1.1 service description, together with every document it
//! imports, into a resolved model of messages, port types, bindings and
//! services.
//!
//! ```no_run
//! use soapstone_wsdl::{loader::Transport, Wsdl};
//!
//! let wsdl = Wsdl::load_with("service.wsdl", &Transport::new()).unwrap();
//! for service in wsdl.services.values() {
//!     println!("{}", service.name);
//! }
//! ```

use indexmap::IndexMap;
use std::{cell::RefCell, rc::Rc};
use url::Url;

mod dump;
mod resolver;

pub mod binding;
pub mod definitions;
pub mod error;
pub mod loader;
pub mod qname;
pub mod registry;
pub mod types;
pub mod xml;
pub mod xsd;

pub use crate::{
    definitions::Definitions,
    error::{Error, Warning},
    qname::QName,
};

use crate::{
    binding::Dispatcher,
    definitions::Context,
    loader::{Loader, Transport},
    registry::Registry,
    types::{Binding, Message, PortType, Service},
    xsd::Schema,
};

/// A fully resolved service description.
///
/// The public maps are those of the root document after its imports were
/// merged; the registry keeps every document loaded on the way.
pub struct Wsdl {
    pub location: Url,

    pub schema: Option<Rc<Schema>>,
    pub messages: IndexMap<QName, Rc<Message>>,
    pub port_types: IndexMap<QName, Rc<PortType>>,
    pub bindings: IndexMap<QName, Rc<Binding>>,
    pub services: IndexMap<QName, Rc<Service>>,

    root: Rc<RefCell<Definitions>>,
    registry: Registry,
    warnings: Vec<Warning>,
}

impl Wsdl {
    /// Loads from a URL or a filesystem path using the default `Transport`.
    pub fn load<S: AsRef<str>>(location: S) -> Result<Self, Error> {
        Self::load_with(location, &Transport::new())
    }

    pub fn load_with<S: AsRef<str>>(location: S, loader: &dyn Loader) -> Result<Self, Error> {
        Self::load_with_dispatcher(location, loader, &Dispatcher::default())
    }

    pub fn load_with_dispatcher<S: AsRef<str>>(
        location: S,
        loader: &dyn Loader,
        dispatcher: &Dispatcher,
    ) -> Result<Self, Error> {
        let location = loader::to_url(location.as_ref())?;

        let mut context = Context::new(loader, dispatcher);
        let root = Definitions::load(&mut context, location.clone())?;
        resolver::resolve_imports(&root)?;

        let Context {
            registry, warnings, ..
        } = context;

        let (schema, messages, port_types, bindings, services) = {
            let definitions = root.borrow();
            (
                definitions.schema.clone(),
                definitions.messages.clone(),
                definitions.port_types.clone(),
                definitions.bindings.clone(),
                definitions.services.clone(),
            )
        };

        Ok(Self {
            location,
            schema,
            messages,
            port_types,
            bindings,
            services,
            root,
            registry,
            warnings,
        })
    }

    /// Runs import resolution on the root again. Everything is already merged
    /// and resolved, so nothing is fetched and nothing changes.
    pub fn resolve_imports(&self) -> Result<(), Error> {
        resolver::resolve_imports(&self.root)
    }

    pub fn root(&self) -> Rc<RefCell<Definitions>> {
        Rc::clone(&self.root)
    }

    /// The `Definitions` loaded for `namespace`, anywhere in the import graph.
    pub fn definitions(&self, namespace: &str) -> Option<Rc<RefCell<Definitions>>> {
        self.registry.get(namespace)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl std::fmt::Debug for Wsdl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Wsdl(location={:?})>", self.location.as_str())
    }
}
