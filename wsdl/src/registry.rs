use indexmap::IndexMap;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{definitions::Definitions, xml::Element};

const PSEUDO_LOCATION_PREFIX: &str = "intschema+";

/// Synthetic location under which an inline schema for `namespace` is
/// registered, so schema imports inside the same description can find it.
pub fn pseudo_location(namespace: &str) -> String {
    format!("{}{}", PSEUDO_LOCATION_PREFIX, namespace)
}

pub fn is_pseudo_location(location: &str) -> bool {
    location.starts_with(PSEUDO_LOCATION_PREFIX)
}

/// Everything loaded during one resolution: at most one `Definitions` per
/// target namespace, plus the inline schema fragments.
#[derive(Default)]
pub struct Registry {
    definitions: IndexMap<String, Rc<RefCell<Definitions>>>,
    fragments: HashMap<String, Rc<Element>>,
}

impl Registry {
    pub fn get(&self, namespace: &str) -> Option<Rc<RefCell<Definitions>>> {
        self.definitions.get(namespace).cloned()
    }

    pub fn register(&mut self, namespace: String, definitions: Rc<RefCell<Definitions>>) {
        self.definitions.insert(namespace, definitions);
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn fragment(&self, location: &str) -> Option<Rc<Element>> {
        self.fragments.get(location).cloned()
    }

    pub fn register_fragment(&mut self, location: String, fragment: Rc<Element>) {
        self.fragments.insert(location, fragment);
    }
}
