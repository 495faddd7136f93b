//! Named registries.
//!
//! An application talking to several databases keeps one [`Registry`] per
//! database and looks them up by name.

use relgraph_core::{ConfigErrorKind, Error, Registry, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registries keyed by database name.
#[derive(Debug, Default)]
pub struct SpecCatalog {
    registries: RwLock<HashMap<String, Arc<Registry>>>,
}

impl SpecCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `registry` under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, registry: Arc<Registry>) -> Option<Arc<Registry>> {
        let name = name.into();
        tracing::debug!(database = %name, "Registered catalog entry");
        self.registries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, registry)
    }

    /// The registry registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Registry>> {
        self.registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnknownDatabase,
                    format!("no registry named {name}"),
                )
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let catalog = SpecCatalog::new();
        let registry = Arc::new(Registry::new());
        assert!(catalog.register("main", Arc::clone(&registry)).is_none());

        let found = catalog.get("main").unwrap();
        assert!(Arc::ptr_eq(&found, &registry));
        assert!(catalog.contains("main"));
        assert_eq!(catalog.names(), vec!["main".to_string()]);
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        let catalog = SpecCatalog::new();
        let err = catalog.get("archive").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownDatabase));
    }

    #[test]
    fn register_replaces() {
        let catalog = SpecCatalog::new();
        catalog.register("main", Arc::new(Registry::new()));
        let previous = catalog.register("main", Arc::new(Registry::new()));
        assert!(previous.is_some());
        assert_eq!(catalog.names().len(), 1);
    }
}
