use std::fmt;

/// A name qualified by the namespace it was declared in.
///
/// Two names identify the same entity only when both parts match. The empty
/// namespace stands for "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: String,
    pub name: String,
}

impl QName {
    pub fn new<N: Into<String>, L: Into<String>>(namespace: N, name: L) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses the `{namespace}name` notation produced by `Display`.
    pub fn parse_clark(text: &str) -> Option<Self> {
        match text.strip_prefix('{') {
            Some(rest) => {
                let (namespace, name) = rest.split_once('}')?;
                Some(Self::new(namespace, name))
            }

            None => Some(Self::new("", text)),
        }
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}

/// Splits a lexical `prefix:local` name.
pub fn split_prefixed(prefixed_name: &str) -> (Option<&str>, &str) {
    match prefixed_name.split_once(':') {
        Some((prefix, local_name)) => (Some(prefix), local_name),
        None => (None, prefixed_name),
    }
}
