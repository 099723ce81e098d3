use indexmap::IndexMap;
use std::{collections::HashSet, rc::Rc};
use url::Url;

use crate::{
    error::Error,
    loader::Loader,
    qname::QName,
    registry::{is_pseudo_location, pseudo_location, Registry},
    xml::{self, Element},
};

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSD_1999_NAMESPACE: &str = "http://www.w3.org/1999/XMLSchema";

pub fn is_schema_namespace(namespace: &str) -> bool {
    namespace == XSD_NAMESPACE || namespace == XSD_1999_NAMESPACE
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Type(QName),
    Ref(QName),
    Inner(TypeKind),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: FieldKind,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Struct(Vec<Field>),
    Extension { base: QName, fields: Vec<Field> },
    Alias(QName),
    Simple(QName),
}

#[derive(Debug, Clone)]
pub struct Type {
    pub name: QName,
    pub kind: TypeKind,
}

/// The payload type system: global elements and named types from every
/// schema reachable from one inline fragment.
#[derive(Debug, Default)]
pub struct Schema {
    elements: IndexMap<QName, Rc<Type>>,
    types: IndexMap<QName, Rc<Type>>,
}

impl Schema {
    pub fn element(&self, name: &QName) -> Option<Rc<Type>> {
        self.elements.get(name).cloned()
    }

    pub fn get_type(&self, name: &QName) -> Option<Rc<Type>> {
        self.types.get(name).cloned()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Rc<Type>> {
        self.elements.values()
    }

    pub fn types(&self) -> impl Iterator<Item = &Rc<Type>> {
        self.types.values()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.types.is_empty()
    }

    /// Built-in datatypes live in the schema namespace itself.
    pub fn is_builtin(name: &QName) -> bool {
        is_schema_namespace(&name.namespace)
    }
}

/// Builds a `Schema` from an inline fragment, following `import` and
/// `include` through the fragment registry or the loader.
pub(crate) struct SchemaBuilder<'a> {
    loader: &'a dyn Loader,
    registry: &'a Registry,
    visited: HashSet<String>,
    schema: Schema,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(loader: &'a dyn Loader, registry: &'a Registry) -> Self {
        Self {
            loader,
            registry,
            visited: HashSet::new(),
            schema: Schema::default(),
        }
    }

    pub fn build(mut self, fragment: &Element, location: &Url) -> Result<Schema, Error> {
        let namespace = fragment.attribute("targetNamespace").unwrap_or_default();
        self.visited.insert(pseudo_location(namespace));
        self.visit(fragment, location, None)?;
        Ok(self.schema)
    }

    fn visit(
        &mut self,
        node: &Element,
        location: &Url,
        including_namespace: Option<&str>,
    ) -> Result<(), Error> {
        let namespace = node
            .attribute("targetNamespace")
            .or(including_namespace)
            .unwrap_or_default()
            .to_owned();

        for child in &node.children {
            if !is_schema_namespace(&child.name.namespace) {
                continue;
            }

            match child.name.name.as_str() {
                "element" => {
                    let name = required_name(child, "element", location)?;
                    let kind = element_kind(child, location)?;
                    let name = QName::new(namespace.as_str(), name);
                    self.schema
                        .elements
                        .insert(name.clone(), Rc::new(Type { name, kind }));
                }

                "complexType" => {
                    let name = required_name(child, "complexType", location)?;
                    let kind = complex_kind(child, location)?;
                    let name = QName::new(namespace.as_str(), name);
                    self.schema
                        .types
                        .insert(name.clone(), Rc::new(Type { name, kind }));
                }

                "simpleType" => {
                    let name = required_name(child, "simpleType", location)?;
                    let kind = simple_kind(child, location)?;
                    let name = QName::new(namespace.as_str(), name);
                    self.schema
                        .types
                        .insert(name.clone(), Rc::new(Type { name, kind }));
                }

                "import" => self.follow(child, location, None)?,
                "include" => self.follow(child, location, Some(namespace.as_str()))?,

                _ => (),
            }
        }

        Ok(())
    }

    fn follow(
        &mut self,
        node: &Element,
        location: &Url,
        including_namespace: Option<&str>,
    ) -> Result<(), Error> {
        let schema_location = match node.attribute("schemaLocation") {
            Some(schema_location) => schema_location,
            None => {
                tracing::debug!(
                    namespace = node.attribute("namespace"),
                    "schema import without location"
                );
                return Ok(());
            }
        };

        if is_pseudo_location(schema_location) {
            if !self.visited.insert(schema_location.to_owned()) {
                return Ok(());
            }

            match self.registry.fragment(schema_location) {
                Some(fragment) => self.visit(&fragment, location, including_namespace),
                None => {
                    tracing::debug!(schema_location, "no inline schema registered");
                    Ok(())
                }
            }
        } else {
            let url = location.join(schema_location)?;
            if !self.visited.insert(url.to_string()) {
                return Ok(());
            }

            tracing::debug!(location = %url, "loading external schema");
            let bytes = self.loader.load(&url).map_err(|source| Error::Fetch {
                location: url.clone(),
                source,
            })?;
            let document = xml::parse(&bytes).map_err(|err| Error::parse(&url, err))?;

            self.visit(&document, &url, including_namespace)
        }
    }
}

fn required_name<'n>(
    node: &'n Element,
    element: &'static str,
    location: &Url,
) -> Result<&'n str, Error> {
    node.attribute("name")
        .ok_or_else(|| Error::missing_attribute(location, element, "name"))
}

fn qname_attribute(node: &Element, value: &str, location: &Url) -> Result<QName, Error> {
    node.resolve_qname(value)
        .map_err(|err| Error::parse(location, err))
}

fn any_type() -> QName {
    QName::new(XSD_NAMESPACE, "anyType")
}

fn schema_children<'n>(node: &'n Element) -> impl Iterator<Item = &'n Element> + 'n {
    node.children
        .iter()
        .filter(|child| is_schema_namespace(&child.name.namespace))
}

fn element_kind(node: &Element, location: &Url) -> Result<TypeKind, Error> {
    if let Some(ty) = node.attribute("type") {
        return Ok(TypeKind::Alias(qname_attribute(node, ty, location)?));
    }

    for child in schema_children(node) {
        match child.name.name.as_str() {
            "complexType" => return complex_kind(child, location),
            "simpleType" => return simple_kind(child, location),
            _ => (),
        }
    }

    Ok(TypeKind::Alias(any_type()))
}

fn complex_kind(node: &Element, location: &Url) -> Result<TypeKind, Error> {
    for child in schema_children(node) {
        match child.name.name.as_str() {
            "sequence" | "all" | "choice" => {
                return Ok(TypeKind::Struct(fields(child, location)?));
            }

            "complexContent" => {
                for derivation in schema_children(child) {
                    if let Some(base) = derivation.attribute("base") {
                        let base = qname_attribute(derivation, base, location)?;
                        let mut extension_fields = Vec::new();

                        for group in schema_children(derivation) {
                            if matches!(group.name.name.as_str(), "sequence" | "all" | "choice") {
                                extension_fields.extend(fields(group, location)?);
                            }
                        }

                        return Ok(TypeKind::Extension {
                            base,
                            fields: extension_fields,
                        });
                    }
                }
            }

            "simpleContent" => {
                for derivation in schema_children(child) {
                    if let Some(base) = derivation.attribute("base") {
                        return Ok(TypeKind::Alias(qname_attribute(derivation, base, location)?));
                    }
                }
            }

            _ => (),
        }
    }

    Ok(TypeKind::Struct(Vec::new()))
}

fn simple_kind(node: &Element, location: &Url) -> Result<TypeKind, Error> {
    for child in schema_children(node) {
        let base = match child.name.name.as_str() {
            "restriction" => child.attribute("base"),
            "list" => child.attribute("itemType"),
            _ => None,
        };

        if let Some(base) = base {
            return Ok(TypeKind::Simple(qname_attribute(child, base, location)?));
        }
    }

    Ok(TypeKind::Simple(QName::new(XSD_NAMESPACE, "anySimpleType")))
}

fn fields(group: &Element, location: &Url) -> Result<Vec<Field>, Error> {
    let mut result = Vec::new();

    for child in schema_children(group) {
        match child.name.name.as_str() {
            "element" => {
                if let Some(reference) = child.attribute("ref") {
                    let reference = qname_attribute(child, reference, location)?;
                    result.push(Field {
                        name: reference.name.clone(),
                        ty: FieldKind::Ref(reference),
                    });
                } else {
                    let name = required_name(child, "element", location)?.to_owned();
                    let ty = match element_kind(child, location)? {
                        TypeKind::Alias(ty) => FieldKind::Type(ty),
                        inner => FieldKind::Inner(inner),
                    };

                    result.push(Field { name, ty });
                }
            }

            "sequence" | "all" | "choice" => result.extend(fields(child, location)?),

            _ => (),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn location() -> Url {
        Url::parse("http://example.com/service.wsdl").unwrap()
    }

    fn fragment(text: &str) -> Element {
        xml::parse(text.as_bytes()).unwrap()
    }

    const TYPES: &str = r#"
        <xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                    xmlns:tns="urn:types" targetNamespace="urn:types">
            <xsd:element name="Echo">
                <xsd:complexType>
                    <xsd:sequence>
                        <xsd:element name="text" type="xsd:string"/>
                        <xsd:element ref="tns:Extra"/>
                    </xsd:sequence>
                </xsd:complexType>
            </xsd:element>
            <xsd:element name="Extra" type="tns:Code"/>
            <xsd:simpleType name="Code">
                <xsd:restriction base="xsd:int"/>
            </xsd:simpleType>
            <xsd:complexType name="Derived">
                <xsd:complexContent>
                    <xsd:extension base="tns:Base">
                        <xsd:sequence>
                            <xsd:element name="more" type="xsd:string"/>
                        </xsd:sequence>
                    </xsd:extension>
                </xsd:complexContent>
            </xsd:complexType>
        </xsd:schema>"#;

    #[test]
    fn collects_global_declarations() {
        let loader = MemoryLoader::new();
        let registry = Registry::default();
        let schema = SchemaBuilder::new(&loader, &registry)
            .build(&fragment(TYPES), &location())
            .unwrap();

        let echo = schema.element(&QName::new("urn:types", "Echo")).unwrap();
        match &echo.kind {
            TypeKind::Struct(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "text");
                assert!(matches!(&fields[1].ty, FieldKind::Ref(name) if name.name == "Extra"));
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let code = schema.get_type(&QName::new("urn:types", "Code")).unwrap();
        assert!(matches!(&code.kind, TypeKind::Simple(base) if base.name == "int"));

        let derived = schema.get_type(&QName::new("urn:types", "Derived")).unwrap();
        assert!(matches!(
            &derived.kind,
            TypeKind::Extension { base, fields } if base.name == "Base" && fields.len() == 1
        ));
    }

    #[test]
    fn follows_pseudo_locations() {
        let loader = MemoryLoader::new();
        let mut registry = Registry::default();
        registry.register_fragment(
            pseudo_location("urn:other"),
            Rc::new(fragment(
                r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:other">
                    <import namespace="urn:main" schemaLocation="intschema+urn:main"/>
                    <element name="Other" type="string"/>
                </schema>"#,
            )),
        );

        let main = fragment(
            r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                <import namespace="urn:other" schemaLocation="intschema+urn:other"/>
                <import namespace="urn:unknown"/>
            </schema>"#,
        );

        let schema = SchemaBuilder::new(&loader, &registry)
            .build(&main, &location())
            .unwrap();

        assert!(schema.element(&QName::new("urn:other", "Other")).is_some());
        assert!(loader.requests().is_empty());
    }

    #[test]
    fn fetches_external_schemas_once() {
        let loader = MemoryLoader::new()
            .with(
                "http://example.com/common.xsd",
                r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:common">
                    <import namespace="urn:common" schemaLocation="common.xsd"/>
                    <complexType name="Shared"/>
                </schema>"#,
            )
            .unwrap();
        let registry = Registry::default();

        let main = fragment(
            r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                <import namespace="urn:common" schemaLocation="common.xsd"/>
            </schema>"#,
        );

        let schema = SchemaBuilder::new(&loader, &registry)
            .build(&main, &location())
            .unwrap();

        assert!(schema.get_type(&QName::new("urn:common", "Shared")).is_some());
        assert_eq!(loader.requests().len(), 1);
    }

    #[test]
    fn missing_external_schema_is_fatal() {
        let loader = MemoryLoader::new();
        let registry = Registry::default();
        let main = fragment(
            r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                <include schemaLocation="missing.xsd"/>
            </schema>"#,
        );

        let result = SchemaBuilder::new(&loader, &registry).build(&main, &location());
        assert!(matches!(result, Err(Error::Fetch { location, .. }) if location.path() == "/missing.xsd"));
    }

    #[test]
    fn builtins_are_schema_namespace_names() {
        assert!(Schema::is_builtin(&QName::new(XSD_NAMESPACE, "string")));
        assert!(Schema::is_builtin(&QName::new(XSD_1999_NAMESPACE, "int")));
        assert!(!Schema::is_builtin(&QName::new("urn:types", "string")));
    }
}
