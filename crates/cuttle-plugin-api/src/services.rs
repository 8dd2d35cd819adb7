//! Host service container boundary
//!
//! The orchestrator consumes a key-value service locator owned by the host
//! application and hands it to every plugin hook. Nothing here inspects
//! container internals beyond this surface.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

/// Type-erased service value
pub type Service = Arc<dyn Any + Send + Sync>;

/// Key-value service locator exposed by the host
pub trait ServiceContainer: Send + Sync {
    /// Resolve a service by key
    fn get(&self, key: &str) -> Option<Service>;

    /// Check whether a key is registered
    fn has(&self, key: &str) -> bool;

    /// Register a singleton service under a key
    fn register_singleton(&self, key: &str, service: Service);

    /// Remove a service, returning whether it existed
    fn remove(&self, key: &str) -> bool;

    /// Keys of every registered service
    fn registered_services(&self) -> Vec<String>;
}

/// In-memory service container
///
/// Default container used when the host does not supply one; also convenient
/// in tests and demos.
#[derive(Clone, Default)]
pub struct InMemoryServices {
    services: Arc<DashMap<String, Service>>,
}

impl InMemoryServices {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryServices")
            .field("keys", &self.registered_services())
            .finish()
    }
}

impl ServiceContainer for InMemoryServices {
    fn get(&self, key: &str) -> Option<Service> {
        self.services.get(key).map(|s| Arc::clone(s.value()))
    }

    fn has(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    fn register_singleton(&self, key: &str, service: Service) {
        self.services.insert(key.to_string(), service);
    }

    fn remove(&self, key: &str) -> bool {
        self.services.remove(key).is_some()
    }

    fn registered_services(&self) -> Vec<String> {
        self.services.iter().map(|e| e.key().clone()).collect()
    }
}
