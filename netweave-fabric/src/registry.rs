//! Persisted named namespaces

use std::sync::Arc;

use netweave_core::{Namespace, NamespaceOps, ResourceName, Result};
use netweave_store::RecordStore;

/// Creates, lists and deletes namespaces, keeping a record of each
#[derive(Clone)]
pub struct NamespaceRegistry {
    ops: Arc<dyn NamespaceOps>,
    store: Arc<dyn RecordStore<Namespace>>,
}

impl NamespaceRegistry {
    /// Create a registry over `ops`, persisting into `store`
    #[must_use]
    pub fn new(ops: Arc<dyn NamespaceOps>, store: Arc<dyn RecordStore<Namespace>>) -> Self {
        Self { ops, store }
    }

    /// Create and record a namespace
    ///
    /// If the record cannot be saved the namespace is removed again.
    pub fn create(&self, name: &ResourceName) -> Result<Namespace> {
        let namespace = self.ops.create(name)?;

        if let Err(e) = self.store.save(&namespace) {
            if let Err(cleanup) = self.ops.delete(&namespace.path) {
                tracing::warn!(
                    namespace = %namespace.name,
                    error = %cleanup,
                    "Failed to remove namespace after failed save"
                );
            }
            return Err(e);
        }

        Ok(namespace)
    }

    /// All recorded namespaces
    pub fn list(&self) -> Result<Vec<Namespace>> {
        self.store.list()
    }

    /// Namespace by name or unique ID prefix
    pub fn find(&self, ident: &str) -> Result<Namespace> {
        self.store.resolve(ident)
    }

    /// Delete a namespace by name or unique ID prefix
    ///
    /// The record is kept if the kernel refuses the delete.
    pub fn delete(&self, ident: &str) -> Result<Namespace> {
        let namespace = self.find(ident)?;

        self.ops.delete(&namespace.path)?;
        self.store.delete(&namespace.id)?;

        Ok(namespace)
    }

    /// Whether the namespace is still bound in the kernel
    #[must_use]
    pub fn is_live(&self, namespace: &Namespace) -> bool {
        self.ops.exists(&namespace.path)
    }

    /// Remove the kernel namespace only
    pub(crate) fn unbind(&self, namespace: &Namespace) -> Result<()> {
        self.ops.delete(&namespace.path)
    }

    /// Remove the record only
    pub(crate) fn forget(&self, namespace: &Namespace) -> Result<()> {
        self.store.delete(&namespace.id)
    }
}

impl std::fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockKernel;
    use netweave_store::MemoryStore;

    fn registry(kernel: &MockKernel) -> (NamespaceRegistry, MemoryStore<Namespace>) {
        let store = MemoryStore::new();
        let registry = NamespaceRegistry::new(Arc::new(kernel.clone()), Arc::new(store.clone()));
        (registry, store)
    }

    #[test]
    fn test_create_records_namespace() {
        let kernel = MockKernel::new();
        let (registry, store) = registry(&kernel);

        let ns = registry.create(&ResourceName::new("h1").unwrap()).unwrap();
        assert!(registry.is_live(&ns));
        assert_eq!(store.len(), 1);
        assert_eq!(registry.list().unwrap()[0].name, ns.name);
    }

    #[test]
    fn test_duplicate_create_keeps_original() {
        let kernel = MockKernel::new();
        let (registry, store) = registry(&kernel);
        let name = ResourceName::new("h1").unwrap();

        let first = registry.create(&name).unwrap();
        assert!(registry.create(&name).unwrap_err().is_already_exists());

        assert_eq!(store.len(), 1);
        assert!(registry.is_live(&first));
    }

    #[test]
    fn test_delete_by_name_and_prefix() {
        let kernel = MockKernel::new();
        let (registry, store) = registry(&kernel);

        let h1 = registry.create(&ResourceName::new("h1").unwrap()).unwrap();
        let h2 = registry.create(&ResourceName::new("h2").unwrap()).unwrap();

        registry.delete("h1").unwrap();
        assert!(!registry.is_live(&h1));

        let deleted = registry.delete(h2.id.as_str()).unwrap();
        assert_eq!(deleted.id, h2.id);
        assert!(store.is_empty());

        assert!(registry.delete("h1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_kernel_delete_keeps_record() {
        let kernel = MockKernel::new();
        let (registry, store) = registry(&kernel);
        registry.create(&ResourceName::new("h1").unwrap()).unwrap();

        kernel.fail_operation("namespace delete");
        assert!(registry.delete("h1").is_err());
        assert_eq!(store.len(), 1);
    }
}
