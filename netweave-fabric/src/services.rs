//! Kernel and store bundles handed to the fabric services

use std::sync::Arc;

use netweave_core::{Bridge, BridgeOps, Container, LinkOps, Namespace, NamespaceOps, NetConfig, Veth};
use netweave_link::{BridgeManager, VethManager};
use netweave_namespace::NetnsManager;
use netweave_store::{JsonFileStore, MemoryStore, RecordStore};

use crate::MockKernel;

/// The three kernel-operation seams
#[derive(Clone)]
pub struct Kernel {
    /// Namespace lifecycle and process execution
    pub namespaces: Arc<dyn NamespaceOps>,
    /// Veth pairs, addresses and interface state
    pub links: Arc<dyn LinkOps>,
    /// Bridges
    pub bridges: Arc<dyn BridgeOps>,
}

impl Kernel {
    /// Operations against the running kernel
    #[must_use]
    pub fn system(config: &NetConfig) -> Self {
        Self {
            namespaces: Arc::new(NetnsManager::new(config.clone())),
            links: Arc::new(VethManager::new(config.clone())),
            bridges: Arc::new(BridgeManager::new()),
        }
    }

    /// Operations against a shared in-memory model
    #[must_use]
    pub fn mock(kernel: &MockKernel) -> Self {
        Self {
            namespaces: Arc::new(kernel.clone()),
            links: Arc::new(kernel.clone()),
            bridges: Arc::new(kernel.clone()),
        }
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel").finish_non_exhaustive()
    }
}

/// One record store per persisted entity
#[derive(Clone)]
pub struct Stores {
    /// Namespace records
    pub namespaces: Arc<dyn RecordStore<Namespace>>,
    /// Veth records
    pub veths: Arc<dyn RecordStore<Veth>>,
    /// Bridge records
    pub bridges: Arc<dyn RecordStore<Bridge>>,
    /// Container records
    pub containers: Arc<dyn RecordStore<Container>>,
}

impl Stores {
    /// JSON files under the configured state directory
    #[must_use]
    pub fn json(config: &NetConfig) -> Self {
        let root = &config.state_dir;
        Self {
            namespaces: Arc::new(JsonFileStore::<Namespace>::new(root)),
            veths: Arc::new(JsonFileStore::<Veth>::new(root)),
            bridges: Arc::new(JsonFileStore::<Bridge>::new(root)),
            containers: Arc::new(JsonFileStore::<Container>::new(root)),
        }
    }

    /// Volatile in-memory stores
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            namespaces: Arc::new(MemoryStore::<Namespace>::new()),
            veths: Arc::new(MemoryStore::<Veth>::new()),
            bridges: Arc::new(MemoryStore::<Bridge>::new()),
            containers: Arc::new(MemoryStore::<Container>::new()),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
