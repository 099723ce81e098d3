use crate::{
    definitions::{Definitions, WSDL_NAMESPACE},
    error::Error,
    types::{Binding, BindingOperation, Protocol},
    xml::Element,
};

pub const SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP12_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const HTTP_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/http/";

/// One wire protocol a `binding` element can be realised with.
pub trait BindingProtocol {
    fn matches(&self, node: &Element) -> bool;
    fn parse(&self, definitions: &Definitions, node: &Element) -> Result<Binding, Error>;
}

/// Candidate protocols, tried in order; the first match parses the binding.
pub struct Dispatcher {
    protocols: Vec<Box<dyn BindingProtocol>>,
}

impl Dispatcher {
    pub fn empty() -> Self {
        Self {
            protocols: Vec::new(),
        }
    }

    pub fn with<P: BindingProtocol + 'static>(mut self, protocol: P) -> Self {
        self.protocols.push(Box::new(protocol));
        self
    }

    /// `None` when no candidate recognises the binding.
    pub fn parse(
        &self,
        definitions: &Definitions,
        node: &Element,
    ) -> Result<Option<Binding>, Error> {
        match self.protocols.iter().find(|protocol| protocol.matches(node)) {
            Some(protocol) => protocol.parse(definitions, node).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::empty()
            .with(SoapBinding::soap11())
            .with(SoapBinding::soap12())
            .with(HttpBinding)
    }
}

/// The fields shared by every binding: name, port type and operation names.
fn parse_common(
    definitions: &Definitions,
    node: &Element,
    protocol: Protocol,
) -> Result<Binding, Error> {
    let name = node
        .attribute("name")
        .ok_or_else(|| Error::missing_attribute(&definitions.location, "binding", "name"))?;
    let port_type = node
        .attribute("type")
        .ok_or_else(|| Error::missing_attribute(&definitions.location, "binding", "type"))?;

    Ok(Binding::new(
        definitions.target_name(name),
        definitions.qname(node, port_type)?,
        protocol,
    ))
}

fn operation_name<'n>(definitions: &Definitions, node: &'n Element) -> Result<&'n str, Error> {
    node.attribute("name")
        .ok_or_else(|| Error::missing_attribute(&definitions.location, "operation", "name"))
}

pub struct SoapBinding {
    namespace: &'static str,
    protocol: Protocol,
}

impl SoapBinding {
    pub fn soap11() -> Self {
        Self {
            namespace: SOAP11_NAMESPACE,
            protocol: Protocol::Soap11,
        }
    }

    pub fn soap12() -> Self {
        Self {
            namespace: SOAP12_NAMESPACE,
            protocol: Protocol::Soap12,
        }
    }

    fn body_use(&self, node: Option<&Element>) -> Option<String> {
        node.and_then(|node| node.child(self.namespace, "body"))
            .and_then(|body| body.attribute("use"))
            .map(ToOwned::to_owned)
    }
}

impl BindingProtocol for SoapBinding {
    fn matches(&self, node: &Element) -> bool {
        node.child(self.namespace, "binding").is_some()
    }

    /// ```xml
    /// <binding name="nmtoken" type="qname">
    ///     <soap:binding style="document" transport="uri"/>
    ///     <operation name="nmtoken">
    ///         <soap:operation soapAction="uri" style="document"/>
    ///         <input><soap:body use="literal"/></input>
    ///         <output><soap:body use="literal"/></output>
    ///     </operation> *
    /// </binding>
    /// ```
    fn parse(&self, definitions: &Definitions, node: &Element) -> Result<Binding, Error> {
        let mut binding = parse_common(definitions, node, self.protocol)?;

        if let Some(soap) = node.child(self.namespace, "binding") {
            binding.transport = soap.attribute("transport").map(ToOwned::to_owned);
            binding.style = soap.attribute("style").map(ToOwned::to_owned);
        }

        for node in node.children_named(WSDL_NAMESPACE, "operation") {
            let mut operation = BindingOperation::new(operation_name(definitions, node)?.to_owned());

            let soap = node.child(self.namespace, "operation");
            operation.action = soap
                .and_then(|soap| soap.attribute("soapAction"))
                .map(ToOwned::to_owned);
            operation.style = soap
                .and_then(|soap| soap.attribute("style"))
                .map(ToOwned::to_owned)
                .or_else(|| binding.style.clone());
            operation.input = self.body_use(node.child(WSDL_NAMESPACE, "input"));
            operation.output = self.body_use(node.child(WSDL_NAMESPACE, "output"));

            binding
                .operations
                .insert(operation.name.clone(), operation);
        }

        Ok(binding)
    }
}

/// HTTP GET/POST bindings.
pub struct HttpBinding;

impl BindingProtocol for HttpBinding {
    fn matches(&self, node: &Element) -> bool {
        node.child(HTTP_NAMESPACE, "binding").is_some()
    }

    fn parse(&self, definitions: &Definitions, node: &Element) -> Result<Binding, Error> {
        let mut binding = parse_common(definitions, node, Protocol::Http)?;

        binding.transport = node
            .child(HTTP_NAMESPACE, "binding")
            .and_then(|http| http.attribute("verb"))
            .map(ToOwned::to_owned);

        for node in node.children_named(WSDL_NAMESPACE, "operation") {
            let mut operation = BindingOperation::new(operation_name(definitions, node)?.to_owned());

            operation.action = node
                .child(HTTP_NAMESPACE, "operation")
                .and_then(|http| http.attribute("location"))
                .map(ToOwned::to_owned);
            operation.input = node
                .child(WSDL_NAMESPACE, "input")
                .and_then(|input| input.children.first())
                .map(|encoding| encoding.name.name.clone());
            operation.output = node
                .child(WSDL_NAMESPACE, "output")
                .and_then(|output| output.children.first())
                .map(|encoding| encoding.name.name.clone());

            binding
                .operations
                .insert(operation.name.clone(), operation);
        }

        Ok(binding)
    }
}
