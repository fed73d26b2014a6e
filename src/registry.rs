//! Process-scoped properties.
//!
//! Components publish values here that other, unrelated parts of the process need to discover at
//! runtime, like the port an embedded server was bound to.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);

#[derive(Debug, Clone, Default)]
pub struct Registry {
    properties: Arc<RwLock<HashMap<String, String>>>,
}

impl Registry {
    /// The registry shared by the whole process
    pub fn global() -> &'static Registry {
        return &GLOBAL;
    }

    pub fn get(&self, key: &str) -> Option<String> {
        return self.properties.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
    }

    /// Sets a property, returning the previous value
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        debug!("Setting property {}={}", key, value);

        return self.properties.write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        debug!("Removing property {}", key);

        return self.properties.write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
