//! The namespace registry: name → namespace with explicit lifetime.
//!
//! A [`Registry`] is an ordinary owned object constructed at startup and
//! passed by handle to whoever needs lookups — deliberately not ambient
//! process-global state, so teardown and tests stay deterministic. Cloned
//! handles share the same underlying table.
//!
//! Destroying a namespace only clears its registry slot: nothing in flight
//! is terminated, and propagation keeps working on surviving [`Namespace`]
//! handles. Teardown is expected to happen after all related in-flight work
//! has drained; that ordering is the application's responsibility.

use crate::error::RegistryError;
use crate::lifecycle::LifecycleSubscriber;
use crate::namespace::Namespace;
use crate::types::UnitId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Process registry of namespaces.
#[derive(Clone, Default)]
pub struct Registry {
    namespaces: Arc<Mutex<HashMap<String, Namespace>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a namespace under a unique non-empty name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::EmptyName`] for an empty name,
    /// [`RegistryError::AlreadyExists`] when the name is taken.
    pub fn create_namespace(&self, name: &str) -> Result<Namespace, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut namespaces = self.namespaces.lock();
        if namespaces.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_owned()));
        }
        let namespace = Namespace::new(name);
        namespaces.insert(name.to_owned(), namespace.clone());
        debug!(namespace = name, "namespace created");
        Ok(namespace)
    }

    /// Looks up a registered namespace by name.
    #[must_use]
    pub fn get_namespace(&self, name: &str) -> Option<Namespace> {
        self.namespaces.lock().get(name).cloned()
    }

    /// Removes a namespace from the registry.
    ///
    /// In-flight propagation on existing handles continues to work; only new
    /// lookups are prevented.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when no namespace is registered under
    /// `name`.
    pub fn destroy_namespace(&self, name: &str) -> Result<(), RegistryError> {
        match self.namespaces.lock().remove(name) {
            Some(_) => {
                debug!(namespace = name, "namespace destroyed");
                Ok(())
            }
            None => Err(RegistryError::NotFound(name.to_owned())),
        }
    }

    /// Destroys every registered namespace.
    pub fn reset(&self) {
        self.namespaces.lock().clear();
        debug!("registry reset");
    }

    /// Number of registered namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.lock().len()
    }

    /// Returns `true` when no namespace is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.lock().is_empty()
    }
}

/// Fan-out: forwarding a notification to the registry delivers it to every
/// registered namespace, so an embedder can wire its scheduler facility to
/// one subscriber.
impl LifecycleSubscriber for Registry {
    fn unit_created(&self, unit: UnitId, kind: &str, trigger: UnitId) {
        for namespace in self.namespaces.lock().values() {
            namespace.unit_created(unit, kind, trigger);
        }
    }

    fn unit_enter(&self, unit: UnitId) {
        for namespace in self.namespaces.lock().values() {
            namespace.unit_enter(unit);
        }
    }

    fn unit_exit(&self, unit: UnitId) {
        for namespace in self.namespaces.lock().values() {
            namespace.unit_exit(unit);
        }
    }

    fn unit_destroyed(&self, unit: UnitId) {
        for namespace in self.namespaces.lock().values() {
            namespace.unit_destroyed(unit);
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("namespaces", &self.len())
            .finish()
    }
}
