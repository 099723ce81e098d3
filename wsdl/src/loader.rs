use reqwest::blocking::Client;
use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::Path,
    time::Duration,
};
use url::Url;

use crate::error::{Error, FetchError};

/// Retrieves the raw bytes behind a location.
pub trait Loader {
    fn load(&self, location: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Loads `file` URLs from disk and `http`/`https` URLs over the network.
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for Transport {
    fn load(&self, location: &Url) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(%location, "fetching");

        match location.scheme() {
            "file" => {
                let path = location
                    .to_file_path()
                    .map_err(|()| FetchError::UnsupportedScheme("file".into()))?;
                Ok(fs::read(path)?)
            }

            "http" | "https" => {
                let response = self
                    .client
                    .get(location.clone())
                    .send()?
                    .error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }

            other => Err(FetchError::UnsupportedScheme(other.into())),
        }
    }
}

/// Serves documents from memory and remembers every location asked for.
#[derive(Default)]
pub struct MemoryLoader {
    documents: HashMap<Url, Vec<u8>>,
    requests: RefCell<Vec<Url>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<D: Into<Vec<u8>>>(&mut self, location: Url, document: D) {
        self.documents.insert(location, document.into());
    }

    pub fn with<D: Into<Vec<u8>>>(mut self, location: &str, document: D) -> Result<Self, Error> {
        self.insert(Url::parse(location)?, document);
        Ok(self)
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.borrow().clone()
    }
}

impl Loader for MemoryLoader {
    fn load(&self, location: &Url) -> Result<Vec<u8>, FetchError> {
        self.requests.borrow_mut().push(location.clone());

        self.documents
            .get(location)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

/// Turns a user supplied location into an absolute URL. Anything that is not
/// already a URL is taken as a filesystem path.
pub fn to_url(location: &str) -> Result<Url, Error> {
    match Url::parse(location) {
        Ok(url) => Ok(url),

        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = Path::new(location);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map_err(|err| Error::PathConversionError(Some(err)))?
                    .join(path)
            };

            Url::from_file_path(&path).map_err(|()| Error::PathConversionError(None))
        }

        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_pass_through() {
        let url = to_url("http://example.com/service?wsdl").unwrap();
        assert_eq!(url.as_str(), "http://example.com/service?wsdl");
    }

    #[test]
    fn relative_paths_become_file_urls() {
        let url = to_url("definitions/service.wsdl").unwrap();
        let expected = std::env::current_dir()
            .unwrap()
            .join("definitions/service.wsdl");

        assert_eq!(url.scheme(), "file");
        assert_eq!(url.to_file_path().unwrap(), expected);
    }

    #[test]
    fn memory_loader_records_requests() {
        let loader = MemoryLoader::new()
            .with("http://example.com/a.wsdl", "<a/>")
            .unwrap();
        let known = Url::parse("http://example.com/a.wsdl").unwrap();
        let unknown = Url::parse("http://example.com/b.wsdl").unwrap();

        assert_eq!(loader.load(&known).unwrap(), b"<a/>");
        assert!(matches!(loader.load(&unknown), Err(FetchError::NotFound)));
        assert_eq!(loader.requests(), vec![known, unknown]);
    }

    #[test]
    fn transport_rejects_unknown_schemes() {
        let location = Url::parse("ftp://example.com/a.wsdl").unwrap();
        assert!(matches!(
            Transport::new().load(&location),
            Err(FetchError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn transport_reads_files() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("a.wsdl");
        fs::write(&path, "<a/>").unwrap();

        let location = Url::from_file_path(&path).unwrap();
        assert_eq!(Transport::new().load(&location).unwrap(), b"<a/>");

        let missing = Url::from_file_path(directory.path().join("b.wsdl")).unwrap();
        assert!(matches!(
            Transport::new().load(&missing),
            Err(FetchError::Io(_))
        ));
    }
}
