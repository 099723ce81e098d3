use indexmap::{IndexMap, IndexSet};
use std::{cell::RefCell, fmt, rc::Rc};
use url::Url;

use crate::{
    binding::Dispatcher,
    error::{Error, Warning},
    loader::Loader,
    qname::QName,
    registry::{pseudo_location, Registry},
    types::{Binding, Message, PortType, Service},
    xml::{self, Element, NamespaceMap},
    xsd::{is_schema_namespace, Schema, SchemaBuilder, XSD_NAMESPACE},
};

pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";

/// State threaded through one load: the collaborators and the registry.
pub(crate) struct Context<'a> {
    pub loader: &'a dyn Loader,
    pub dispatcher: &'a Dispatcher,
    pub registry: Registry,
    pub warnings: Vec<Warning>,
}

impl<'a> Context<'a> {
    pub fn new(loader: &'a dyn Loader, dispatcher: &'a Dispatcher) -> Self {
        Self {
            loader,
            dispatcher,
            registry: Registry::default(),
            warnings: Vec::new(),
        }
    }

    fn fetch_document(&self, location: &Url) -> Result<Element, Error> {
        let bytes = self.loader.load(location).map_err(|source| Error::Fetch {
            location: location.clone(),
            source,
        })?;

        xml::parse(&bytes).map_err(|err| Error::parse(location, err))
    }
}

/// One parsed description document and the documents it imports directly.
pub struct Definitions {
    pub location: Url,
    pub target_namespace: String,
    pub namespaces: NamespaceMap,

    pub schema: Option<Rc<Schema>>,
    pub messages: IndexMap<QName, Rc<Message>>,
    pub port_types: IndexMap<QName, Rc<PortType>>,
    pub bindings: IndexMap<QName, Rc<Binding>>,
    pub services: IndexMap<QName, Rc<Service>>,

    pub(crate) unsupported_bindings: IndexSet<QName>,
    pub(crate) imports: IndexMap<String, Rc<RefCell<Definitions>>>,
}

impl fmt::Debug for Definitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definitions")
            .field("location", &self.location.as_str())
            .field("target_namespace", &self.target_namespace)
            .finish_non_exhaustive()
    }
}

impl Definitions {
    pub fn new(location: Url, target_namespace: String) -> Self {
        Self {
            location,
            target_namespace,
            namespaces: NamespaceMap::new(),
            schema: None,
            messages: IndexMap::new(),
            port_types: IndexMap::new(),
            bindings: IndexMap::new(),
            services: IndexMap::new(),
            unsupported_bindings: IndexSet::new(),
            imports: IndexMap::new(),
        }
    }

    pub fn target_name(&self, name: &str) -> QName {
        QName::new(self.target_namespace.as_str(), name)
    }

    /// Resolves a `prefix:local` attribute value found on `node`.
    pub fn qname(&self, node: &Element, value: &str) -> Result<QName, Error> {
        node.resolve_qname(value)
            .map_err(|err| Error::parse(&self.location, err))
    }

    pub fn is_unsupported_binding(&self, name: &QName) -> bool {
        self.unsupported_bindings.contains(name)
    }

    /// Namespaces imported but not yet merged.
    pub fn pending_imports(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().map(String::as_str)
    }

    /// Loads the document at `location` and, recursively, every document it
    /// imports that is not in the registry yet.
    pub(crate) fn load(
        context: &mut Context<'_>,
        location: Url,
    ) -> Result<Rc<RefCell<Self>>, Error> {
        tracing::debug!(%location, "loading definitions");

        let document = context.fetch_document(&location)?;
        if !document.is(WSDL_NAMESPACE, "definitions") {
            return Err(Error::UnexpectedRoot {
                location,
                found: document.name,
            });
        }

        let target_namespace = document
            .attribute("targetNamespace")
            .unwrap_or_default()
            .to_owned();

        // One Definitions per namespace, however the importer named it.
        if let Some(existing) = context.registry.get(&target_namespace) {
            tracing::debug!(
                %location,
                namespace = target_namespace.as_str(),
                "namespace already loaded"
            );
            return Ok(existing);
        }

        let mut definitions = Self::new(location, target_namespace.clone());
        definitions.namespaces = document.namespaces().clone();
        let definitions = Rc::new(RefCell::new(definitions));

        // Registered before the imports so that a cycle back to this
        // namespace finds it instead of loading it again.
        context
            .registry
            .register(target_namespace, Rc::clone(&definitions));

        let imports = Self::parse_imports(context, &definitions, &document)?;
        definitions.borrow_mut().imports = imports;

        let schema = Self::parse_types(context, &definitions.borrow(), &document)?;
        definitions.borrow_mut().schema = schema.map(Rc::new);

        let (messages, port_types, services) = {
            let this = definitions.borrow();
            (
                this.parse_messages(&document)?,
                this.parse_port_types(&document)?,
                this.parse_services(&document)?,
            )
        };

        let (bindings, unsupported) =
            Self::parse_bindings(context, &definitions.borrow(), &document)?;

        let mut this = definitions.borrow_mut();
        this.messages = messages;
        this.port_types = port_types;
        this.bindings = bindings;
        this.unsupported_bindings = unsupported;
        this.services = services;
        drop(this);

        Ok(definitions)
    }

    /// Imports are non-transitive: only what the imported document itself
    /// defines becomes visible here. Cycles (A -> B -> A) end at the registry.
    fn parse_imports(
        context: &mut Context<'_>,
        definitions: &Rc<RefCell<Self>>,
        document: &Element,
    ) -> Result<IndexMap<String, Rc<RefCell<Self>>>, Error> {
        let location = definitions.borrow().location.clone();
        let mut imports = IndexMap::new();

        for node in document.children_named(WSDL_NAMESPACE, "import") {
            let namespace = node.attribute("namespace").ok_or_else(|| Error::Import {
                location: location.clone(),
                attribute: "namespace",
            })?;
            let import_location = node.attribute("location").ok_or_else(|| Error::Import {
                location: location.clone(),
                attribute: "location",
            })?;

            let imported = match context.registry.get(namespace) {
                Some(imported) => imported,
                None => {
                    let imported = location
                        .join(import_location)
                        .map_err(Error::from)
                        .and_then(|import_location| Self::load(context, import_location))
                        .map_err(|err| Error::import_failed(&location, namespace, err))?;

                    let declared = imported.borrow().target_namespace.clone();
                    if declared != namespace {
                        let imported_location = imported.borrow().location.clone();
                        tracing::warn!(
                            import = namespace,
                            declared = declared.as_str(),
                            location = %imported_location,
                            "imported document declares a different target namespace"
                        );

                        context.warnings.push(Warning::NamespaceMismatch {
                            location: imported_location,
                            expected: namespace.to_owned(),
                            declared,
                        });
                    }

                    imported
                }
            };

            imports.insert(namespace.to_owned(), imported);
        }

        Ok(imports)
    }

    /// ```xml
    /// <definitions>
    ///     <types>
    ///         <xsd:schema/>*
    ///     </types>
    /// </definitions>
    /// ```
    ///
    /// Every inline schema is registered under its pseudo-location, and
    /// schema imports without a location are pointed at one.
    fn parse_types(
        context: &mut Context<'_>,
        definitions: &Self,
        document: &Element,
    ) -> Result<Option<Schema>, Error> {
        let types = match document.child(WSDL_NAMESPACE, "types") {
            Some(types) => types,
            None => return Ok(None),
        };

        let mut fragments: Vec<Element> = types
            .children
            .iter()
            .filter(|child| is_schema_namespace(&child.name.namespace) && child.name.name == "schema")
            .cloned()
            .collect();

        if fragments.is_empty() {
            return Ok(None);
        }

        for fragment in &mut fragments {
            for import in &mut fragment.children {
                if !import.is(XSD_NAMESPACE, "import") || import.attribute("schemaLocation").is_some() {
                    continue;
                }

                let namespace = import.attribute("namespace").unwrap_or_default();
                let location = pseudo_location(namespace);
                import.set_attribute("schemaLocation", location);
            }
        }

        let fragments: Vec<Rc<Element>> = fragments.into_iter().map(Rc::new).collect();
        for fragment in &fragments {
            let namespace = fragment.attribute("targetNamespace").unwrap_or_default();
            context
                .registry
                .register_fragment(pseudo_location(namespace), Rc::clone(fragment));
        }

        SchemaBuilder::new(context.loader, &context.registry)
            .build(&fragments[0], &definitions.location)
            .map(Some)
    }

    fn parse_messages(&self, document: &Element) -> Result<IndexMap<QName, Rc<Message>>, Error> {
        let mut result = IndexMap::new();

        for node in document.children_named(WSDL_NAMESPACE, "message") {
            let message = Message::parse(self, node)?;
            result.insert(message.name.clone(), Rc::new(message));
        }

        Ok(result)
    }

    fn parse_port_types(
        &self,
        document: &Element,
    ) -> Result<IndexMap<QName, Rc<PortType>>, Error> {
        let mut result = IndexMap::new();

        for node in document.children_named(WSDL_NAMESPACE, "portType") {
            let port_type = PortType::parse(self, node)?;
            result.insert(port_type.name.clone(), Rc::new(port_type));
        }

        Ok(result)
    }

    fn parse_bindings(
        context: &mut Context<'_>,
        definitions: &Self,
        document: &Element,
    ) -> Result<(IndexMap<QName, Rc<Binding>>, IndexSet<QName>), Error> {
        let mut result = IndexMap::new();
        let mut unsupported = IndexSet::new();

        for node in document.children_named(WSDL_NAMESPACE, "binding") {
            match context.dispatcher.parse(definitions, node)? {
                Some(binding) => {
                    result.insert(binding.name.clone(), Rc::new(binding));
                }

                None => {
                    let name = definitions.target_name(node.attribute("name").unwrap_or_default());
                    tracing::warn!(binding = %name, location = %definitions.location, "unsupported binding");

                    context.warnings.push(Warning::UnsupportedBinding {
                        name: name.clone(),
                        location: definitions.location.clone(),
                    });
                    unsupported.insert(name);
                }
            }
        }

        Ok((result, unsupported))
    }

    fn parse_services(&self, document: &Element) -> Result<IndexMap<QName, Rc<Service>>, Error> {
        let mut result = IndexMap::new();

        for node in document.children_named(WSDL_NAMESPACE, "service") {
            let service = Service::parse(self, node)?;
            result.insert(service.name.clone(), Rc::new(service));
        }

        Ok(result)
    }
}
