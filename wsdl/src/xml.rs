use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::{collections::HashMap, io::BufRead, rc::Rc};
use thiserror::Error;

use crate::qname::{split_prefixed, QName};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix to namespace bindings in scope for an element. `None` is the
/// default namespace.
pub type NamespaceMap = HashMap<Option<String>, String>;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML")]
    Syntax(#[from] quick_xml::Error),

    #[error("Undeclared namespace prefix {0}")]
    UnknownPrefix(String),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Element {0} found after the root element")]
    TrailingElement(String),
}

/// One element of a parsed document, with every name already resolved
/// against the namespaces in scope where it appeared.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    attributes: Vec<(String, String)>,
    namespaces: Rc<NamespaceMap>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn from_start<B: BufRead>(
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        parent_namespaces: &Rc<NamespaceMap>,
    ) -> Result<Self, XmlError> {
        let mut declared = Vec::new();
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = reader.decode(attribute.key)?;
            let unescaped = attribute.unescaped_value()?;
            let value = reader.decode(&unescaped)?.to_owned();

            match split_prefixed(key) {
                (Some("xmlns"), prefix) => declared.push((Some(prefix.to_owned()), value)),
                (None, "xmlns") => declared.push((None, value)),
                _ => attributes.push((key.to_owned(), value)),
            }
        }

        let namespaces = if declared.is_empty() {
            Rc::clone(parent_namespaces)
        } else {
            let mut namespaces = NamespaceMap::clone(parent_namespaces);
            namespaces.extend(declared);
            Rc::new(namespaces)
        };

        let (prefix, local_name) = split_prefixed(reader.decode(start.name())?);
        let namespace = lookup_prefix(&namespaces, prefix)?;

        Ok(Self {
            name: QName::new(namespace, local_name),
            attributes,
            namespaces,
            children: Vec::new(),
            text: String::new(),
        })
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name.namespace == namespace && self.name.name == name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute<V: Into<String>>(&mut self, name: &str, value: V) {
        let value = value.into();

        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_owned(), value)),
        }
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(namespace, name))
    }

    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.is(namespace, name))
    }

    /// First child with the given local name, in any namespace.
    pub fn child_local(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name.name == name)
    }

    /// Resolves a lexical `prefix:local` value (such as `type="tns:Echo"`)
    /// using the prefixes in scope on this element.
    pub fn resolve_qname(&self, value: &str) -> Result<QName, XmlError> {
        let (prefix, local_name) = split_prefixed(value.trim());
        let namespace = lookup_prefix(&self.namespaces, prefix)?;
        Ok(QName::new(namespace, local_name))
    }
}

fn lookup_prefix(namespaces: &NamespaceMap, prefix: Option<&str>) -> Result<String, XmlError> {
    match prefix {
        Some("xml") => Ok(XML_NAMESPACE.to_owned()),

        Some(prefix) => namespaces
            .get(&Some(prefix.to_owned()))
            .cloned()
            .ok_or_else(|| XmlError::UnknownPrefix(prefix.to_owned())),

        None => Ok(namespaces.get(&None).cloned().unwrap_or_default()),
    }
}

/// Parses a document into an owned, namespace-resolved element tree.
pub fn parse(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    reader.expand_empty_elements(true);

    let root_namespaces = Rc::new(NamespaceMap::new());
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    let mut buffer = Vec::new();

    loop {
        match reader.read_event(&mut buffer)? {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    let name = reader.decode(start.name())?;
                    return Err(XmlError::TrailingElement(name.to_owned()));
                }

                let parent_namespaces = stack
                    .last()
                    .map_or(&root_namespaces, |parent| &parent.namespaces);
                let element = Element::from_start(&reader, &start, parent_namespaces)?;
                stack.push(element);
            }

            Event::End(..) => {
                if let Some(element) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
            }

            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text.unescaped()?;
                    current.text.push_str(reader.decode(&unescaped)?);
                }
            }

            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(reader.decode(&data)?);
                }
            }

            Event::Eof => break,

            _ => (),
        }

        buffer.clear();
    }

    root.ok_or(XmlError::MissingRoot)
}
