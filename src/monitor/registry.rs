use std::sync::{PoisonError, RwLock};

use crate::config::NamespaceConfig;

/// Ordered list of namespaces to monitor.
///
/// Updates replace the whole list; nothing is merged with prior entries and
/// duplicate names are kept as given.
pub struct NamespaceRegistry {
    namespaces: RwLock<Vec<NamespaceConfig>>,
}

impl NamespaceRegistry {
    pub fn new(namespaces: Vec<NamespaceConfig>) -> Self {
        Self {
            namespaces: RwLock::new(namespaces),
        }
    }

    pub fn list(&self) -> Vec<NamespaceConfig> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|ns| ns.name.clone())
            .collect()
    }

    /// Names of enabled namespaces, in registry order
    pub fn enabled(&self) -> Vec<String> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|ns| ns.enabled)
            .map(|ns| ns.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace_all(&self, namespaces: Vec<NamespaceConfig>) {
        *self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner) = namespaces;
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
