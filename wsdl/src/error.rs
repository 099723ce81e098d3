use thiserror::Error;
use url::Url;

use crate::{qname::QName, xml::XmlError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path")]
    PathConversionError(Option<std::io::Error>),

    #[error("Unable to fetch {location}")]
    Fetch {
        location: Url,
        #[source]
        source: FetchError,
    },

    #[error("Error parsing XML input from {location}")]
    Parse {
        location: Url,
        #[source]
        source: XmlError,
    },

    #[error("Expected a definitions element at the root of {location}, found {found}")]
    UnexpectedRoot { location: Url, found: QName },

    #[error("Malformed import in {location}: missing {attribute} attribute")]
    Import {
        location: Url,
        attribute: &'static str,
    },

    #[error("Unable to load import of {namespace} from {location}")]
    ImportFailed {
        location: Url,
        namespace: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Missing {attribute} attribute on {element} in {location}")]
    MissingAttribute {
        location: Url,
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Unable to resolve {kind} {name} referenced from {location}")]
    Reference {
        location: Url,
        kind: &'static str,
        name: QName,
    },
}

/// Why a location could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to open file")]
    Io(#[from] std::io::Error),

    #[error("Unable to get file from server")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unsupported URL scheme {0}")]
    UnsupportedScheme(String),

    #[error("No document registered for this location")]
    NotFound,
}

impl Error {
    pub(crate) fn reference(location: &Url, kind: &'static str, name: &QName) -> Self {
        Self::Reference {
            location: location.clone(),
            kind,
            name: name.clone(),
        }
    }

    pub(crate) fn missing_attribute(
        location: &Url,
        element: &'static str,
        attribute: &'static str,
    ) -> Self {
        Self::MissingAttribute {
            location: location.clone(),
            element,
            attribute,
        }
    }

    pub(crate) fn import_failed(location: &Url, namespace: &str, source: Error) -> Self {
        Self::ImportFailed {
            location: location.clone(),
            namespace: namespace.to_owned(),
            source: Box::new(source),
        }
    }

    pub(crate) fn parse(location: &Url, source: XmlError) -> Self {
        Self::Parse {
            location: location.clone(),
            source,
        }
    }
}

/// Non-fatal conditions collected while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnsupportedBinding { name: QName, location: Url },

    /// An import named `expected`, but the document at `location` declares
    /// `declared`. Nothing is merged from it.
    NamespaceMismatch {
        location: Url,
        expected: String,
        declared: String,
    },
}
