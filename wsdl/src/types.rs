use indexmap::IndexMap;
use std::{cell::OnceCell, rc::Rc};
use url::Url;

use crate::{
    definitions::{Definitions, WSDL_NAMESPACE},
    error::Error,
    qname::QName,
    xml::Element,
    xsd::{self, Schema},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartReference {
    Element(QName),
    Type(QName),
}

#[derive(Debug, Clone)]
pub enum PartType {
    Element(Rc<xsd::Type>),
    Type(Rc<xsd::Type>),
    Builtin(QName),
}

#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub reference: PartReference,
    resolved: OnceCell<PartType>,
}

#[derive(Debug)]
pub struct Message {
    pub name: QName,
    pub parts: IndexMap<String, Part>,
}

#[derive(Debug, Default)]
pub struct OperationMessages {
    pub input: Option<Rc<Message>>,
    pub output: Option<Rc<Message>>,
    pub faults: IndexMap<String, Rc<Message>>,
}

#[derive(Debug)]
pub struct Operation {
    pub name: String,
    pub documentation: Option<String>,
    pub input: Option<QName>,
    pub output: Option<QName>,
    pub faults: IndexMap<String, QName>,
    messages: OnceCell<OperationMessages>,
}

#[derive(Debug)]
pub struct PortType {
    pub name: QName,
    pub operations: IndexMap<String, Rc<Operation>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Soap11,
    Soap12,
    Http,
}

#[derive(Debug)]
pub struct BindingOperation {
    pub name: String,
    pub action: Option<String>,
    pub style: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    operation: OnceCell<Rc<Operation>>,
}

#[derive(Debug)]
pub struct Binding {
    pub name: QName,
    pub port_type_name: QName,
    pub protocol: Protocol,
    /// Transport URI for SOAP bindings, HTTP verb for HTTP bindings.
    pub transport: Option<String>,
    pub style: Option<String>,
    pub operations: IndexMap<String, BindingOperation>,
    port_type: OnceCell<Rc<PortType>>,
}

#[derive(Debug)]
pub struct Port {
    pub name: String,
    pub binding_name: QName,
    pub location: Option<String>,
    binding: OnceCell<Rc<Binding>>,
}

#[derive(Debug)]
pub struct Service {
    pub name: QName,
    pub ports: IndexMap<String, Port>,
}

fn required<'n>(
    definitions: &Definitions,
    node: &'n Element,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'n str, Error> {
    node.attribute(attribute)
        .ok_or_else(|| Error::missing_attribute(&definitions.location, element, attribute))
}

impl Part {
    fn resolve(&self, schema: Option<&Schema>, location: &Url) -> Result<(), Error> {
        if self.resolved.get().is_some() {
            return Ok(());
        }

        let resolved = match &self.reference {
            PartReference::Element(name) => schema
                .and_then(|schema| schema.element(name))
                .map(PartType::Element)
                .ok_or_else(|| Error::reference(location, "element", name))?,

            PartReference::Type(name) if Schema::is_builtin(name) => PartType::Builtin(name.clone()),

            PartReference::Type(name) => schema
                .and_then(|schema| schema.get_type(name))
                .map(PartType::Type)
                .ok_or_else(|| Error::reference(location, "type", name))?,
        };

        let _ = self.resolved.set(resolved);
        Ok(())
    }

    pub fn resolved(&self) -> Option<&PartType> {
        self.resolved.get()
    }
}

impl Message {
    /// ```xml
    /// <message name="nmtoken">
    ///     <part name="nmtoken" element="qname"? type="qname"?/> *
    /// </message>
    /// ```
    pub fn parse(definitions: &Definitions, node: &Element) -> Result<Self, Error> {
        let name = required(definitions, node, "message", "name")?;
        let mut parts = IndexMap::new();

        for part in node.children_named(WSDL_NAMESPACE, "part") {
            let part_name = required(definitions, part, "part", "name")?;

            let reference = if let Some(element) = part.attribute("element") {
                PartReference::Element(definitions.qname(part, element)?)
            } else if let Some(ty) = part.attribute("type") {
                PartReference::Type(definitions.qname(part, ty)?)
            } else {
                return Err(Error::missing_attribute(
                    &definitions.location,
                    "part",
                    "element",
                ));
            };

            parts.insert(
                part_name.to_owned(),
                Part {
                    name: part_name.to_owned(),
                    reference,
                    resolved: OnceCell::new(),
                },
            );
        }

        Ok(Self {
            name: definitions.target_name(name),
            parts,
        })
    }

    pub fn resolve(&self, definitions: &Definitions) -> Result<(), Error> {
        let schema = definitions.schema.as_deref();

        for part in self.parts.values() {
            part.resolve(schema, &definitions.location)?;
        }

        Ok(())
    }
}

impl Operation {
    pub fn messages(&self) -> Option<&OperationMessages> {
        self.messages.get()
    }

    fn resolve(&self, definitions: &Definitions) -> Result<(), Error> {
        if self.messages.get().is_some() {
            return Ok(());
        }

        let lookup = |name: &QName| {
            definitions
                .messages
                .get(name)
                .cloned()
                .ok_or_else(|| Error::reference(&definitions.location, "message", name))
        };

        let mut messages = OperationMessages::default();
        messages.input = self.input.as_ref().map(lookup).transpose()?;
        messages.output = self.output.as_ref().map(lookup).transpose()?;

        for (name, message) in &self.faults {
            messages.faults.insert(name.clone(), lookup(message)?);
        }

        let _ = self.messages.set(messages);
        Ok(())
    }
}

impl PortType {
    /// ```xml
    /// <portType name="nmtoken">
    ///     <operation name="nmtoken">
    ///         <documentation/>?
    ///         <input message="qname"/>?
    ///         <output message="qname"/>?
    ///         <fault name="nmtoken" message="qname"/>*
    ///     </operation> *
    /// </portType>
    /// ```
    pub fn parse(definitions: &Definitions, node: &Element) -> Result<Self, Error> {
        let name = required(definitions, node, "portType", "name")?;
        let mut operations = IndexMap::new();

        for operation in node.children_named(WSDL_NAMESPACE, "operation") {
            let operation_name = required(definitions, operation, "operation", "name")?;

            let documentation = operation
                .child(WSDL_NAMESPACE, "documentation")
                .map(|documentation| documentation.text.clone());

            let input = match operation.child(WSDL_NAMESPACE, "input") {
                Some(input) => {
                    let message = required(definitions, input, "input", "message")?;
                    Some(definitions.qname(input, message)?)
                }
                None => None,
            };

            let output = match operation.child(WSDL_NAMESPACE, "output") {
                Some(output) => {
                    let message = required(definitions, output, "output", "message")?;
                    Some(definitions.qname(output, message)?)
                }
                None => None,
            };

            let mut faults = IndexMap::new();
            for fault in operation.children_named(WSDL_NAMESPACE, "fault") {
                let fault_name = required(definitions, fault, "fault", "name")?;
                let message = required(definitions, fault, "fault", "message")?;
                faults.insert(fault_name.to_owned(), definitions.qname(fault, message)?);
            }

            operations.insert(
                operation_name.to_owned(),
                Rc::new(Operation {
                    name: operation_name.to_owned(),
                    documentation,
                    input,
                    output,
                    faults,
                    messages: OnceCell::new(),
                }),
            );
        }

        Ok(Self {
            name: definitions.target_name(name),
            operations,
        })
    }

    pub fn resolve(&self, definitions: &Definitions) -> Result<(), Error> {
        for operation in self.operations.values() {
            operation.resolve(definitions)?;
        }

        Ok(())
    }
}

impl BindingOperation {
    pub fn new(name: String) -> Self {
        Self {
            name,
            action: None,
            style: None,
            input: None,
            output: None,
            operation: OnceCell::new(),
        }
    }

    /// The abstract operation this binds, once resolved.
    pub fn operation(&self) -> Option<&Rc<Operation>> {
        self.operation.get()
    }

    fn resolve(&self, port_type: &PortType, location: &Url) -> Result<(), Error> {
        let operation = port_type.operations.get(&self.name).ok_or_else(|| {
            Error::reference(
                location,
                "operation",
                &QName::new(port_type.name.namespace.as_str(), self.name.as_str()),
            )
        })?;

        let _ = self.operation.set(Rc::clone(operation));
        Ok(())
    }
}

impl Binding {
    pub fn new(name: QName, port_type_name: QName, protocol: Protocol) -> Self {
        Self {
            name,
            port_type_name,
            protocol,
            transport: None,
            style: None,
            operations: IndexMap::new(),
            port_type: OnceCell::new(),
        }
    }

    pub fn port_type(&self) -> Option<&Rc<PortType>> {
        self.port_type.get()
    }

    pub fn resolve(&self, definitions: &Definitions) -> Result<(), Error> {
        if self.port_type.get().is_some() {
            return Ok(());
        }

        let port_type = definitions
            .port_types
            .get(&self.port_type_name)
            .cloned()
            .ok_or_else(|| {
                Error::reference(&definitions.location, "port type", &self.port_type_name)
            })?;

        for operation in self.operations.values() {
            operation.resolve(&port_type, &definitions.location)?;
        }

        let _ = self.port_type.set(port_type);
        Ok(())
    }
}

impl Port {
    pub fn binding(&self) -> Option<&Rc<Binding>> {
        self.binding.get()
    }
}

impl Service {
    /// ```xml
    /// <service name="nmtoken">
    ///     <port name="nmtoken" binding="qname">
    ///         <soap:address location="uri"/>
    ///     </port> *
    /// </service>
    /// ```
    pub fn parse(definitions: &Definitions, node: &Element) -> Result<Self, Error> {
        let name = required(definitions, node, "service", "name")?;
        let mut ports = IndexMap::new();

        for port in node.children_named(WSDL_NAMESPACE, "port") {
            let port_name = required(definitions, port, "port", "name")?;
            let binding = required(definitions, port, "port", "binding")?;

            let location = port
                .child_local("address")
                .and_then(|address| address.attribute("location"))
                .map(ToOwned::to_owned);

            ports.insert(
                port_name.to_owned(),
                Port {
                    name: port_name.to_owned(),
                    binding_name: definitions.qname(port, binding)?,
                    location,
                    binding: OnceCell::new(),
                },
            );
        }

        Ok(Self {
            name: definitions.target_name(name),
            ports,
        })
    }

    pub fn resolve(&self, definitions: &Definitions) -> Result<(), Error> {
        for port in self.ports.values() {
            if port.binding.get().is_some() {
                continue;
            }

            match definitions.bindings.get(&port.binding_name) {
                Some(binding) => {
                    let _ = port.binding.set(Rc::clone(binding));
                }

                None if definitions.is_unsupported_binding(&port.binding_name) => {
                    tracing::warn!(
                        service = %self.name,
                        port = %port.name,
                        binding = %port.binding_name,
                        "port uses an unsupported binding, leaving it unresolved"
                    );
                }

                None => {
                    return Err(Error::reference(
                        &definitions.location,
                        "binding",
                        &port.binding_name,
                    ))
                }
            }
        }

        Ok(())
    }
}
