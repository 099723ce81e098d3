use indexmap::IndexMap;
use std::{cell::RefCell, mem, rc::Rc};

use crate::{definitions::Definitions, error::Error, qname::QName};

/// Copies the entries of `source` declared in `namespace` into `target`.
/// Values are shared, not copied.
fn merge_namespace<T>(
    target: &mut IndexMap<QName, Rc<T>>,
    source: &IndexMap<QName, Rc<T>>,
    namespace: &str,
) {
    target.extend(
        source
            .iter()
            .filter(|(name, _)| name.in_namespace(namespace))
            .map(|(name, value)| (name.clone(), Rc::clone(value))),
    );
}

impl Definitions {
    /// Makes what `other` declares in `namespace` visible here. Anything
    /// `other` merged in from its own imports lives in another namespace
    /// and is filtered out.
    pub(crate) fn merge(&mut self, other: &Definitions, namespace: &str) {
        if self.schema.as_ref().map_or(true, |schema| schema.is_empty()) {
            if let Some(schema) = other.schema.as_ref().filter(|schema| !schema.is_empty()) {
                self.schema = Some(Rc::clone(schema));
            }
        }

        merge_namespace(&mut self.messages, &other.messages, namespace);
        merge_namespace(&mut self.port_types, &other.port_types, namespace);
        merge_namespace(&mut self.bindings, &other.bindings, namespace);
        merge_namespace(&mut self.services, &other.services, namespace);

        self.unsupported_bindings.extend(
            other
                .unsupported_bindings
                .iter()
                .filter(|name| name.in_namespace(namespace))
                .cloned(),
        );
    }

    /// Resolves the references of every entity this document declares.
    /// Merged entities are skipped on purpose: the document that declared
    /// them resolved them against its own imports before this one runs.
    pub(crate) fn resolve_entities(&self) -> Result<(), Error> {
        let namespace = self.target_namespace.as_str();

        for message in owned(&self.messages, namespace) {
            message.resolve(self)?;
        }

        for port_type in owned(&self.port_types, namespace) {
            port_type.resolve(self)?;
        }

        for binding in owned(&self.bindings, namespace) {
            binding.resolve(self)?;
        }

        for service in owned(&self.services, namespace) {
            service.resolve(self)?;
        }

        Ok(())
    }
}

fn owned<'a, T>(
    entities: &'a IndexMap<QName, Rc<T>>,
    namespace: &'a str,
) -> impl Iterator<Item = &'a Rc<T>> + 'a {
    entities
        .iter()
        .filter(move |(name, _)| name.in_namespace(namespace))
        .map(|(_, entity)| entity)
}

/// ```text
/// A -> B -> C -> D
/// ```
///
/// Items defined in D are only available in C, not in A or B. Every
/// `Definitions` merges its direct imports before any of its entities are
/// resolved; a second call finds nothing pending and changes nothing.
pub fn resolve_imports(definitions: &Rc<RefCell<Definitions>>) -> Result<(), Error> {
    let imports = mem::take(&mut definitions.borrow_mut().imports);

    for (namespace, imported) in &imports {
        if Rc::ptr_eq(definitions, imported) {
            continue;
        }

        let imported = imported.borrow();
        definitions.borrow_mut().merge(&imported, namespace);
    }

    for imported in imports.values() {
        if !Rc::ptr_eq(definitions, imported) {
            resolve_imports(imported)?;
        }
    }

    let definitions = definitions.borrow();
    tracing::debug!(location = %definitions.location, "resolving definitions");
    definitions.resolve_entities()
}
