//! Name-indexed service registry.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::service::Service;

/// Errors raised at service registration time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A service with this name is already registered.
    #[error("service '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The service reported an empty name.
    #[error("service name must not be empty")]
    EmptyName,
}

/// Registry of domain services, keyed by name.
///
/// Registration happens at startup; lookups and [`all`](Self::all)
/// snapshots are reader-side and cheap. The snapshot preserves
/// registration order, which the list aggregation relies on.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn Service>>>,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .services
            .read()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

impl ServiceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its own name.
    pub fn register(&self, service: Arc<dyn Service>) -> Result<(), RegistryError> {
        let name = service.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut services = self.services.write();
        if services.iter().any(|s| s.name() == name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        services.push(service);
        Ok(())
    }

    /// Look up a service by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .read()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Point-in-time snapshot in registration order.
    ///
    /// Iteration over the snapshot is safe without holding the lock.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn Service>> {
        self.services.read().clone()
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}
