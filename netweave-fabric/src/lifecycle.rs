//! Container lifecycle
//!
//! A container bundles one namespace with the bridges inside it and the veth
//! pairs it owns. Containers are created empty, grown one resource at a
//! time, and deleted as a unit.
//!
//! Deletion is best effort. Kernel resources of a half-destroyed container
//! routinely vanish on their own (a veth dies with the namespace holding its
//! peer), so every step is attempted and each failure becomes a
//! [`CleanupWarning`] instead of aborting the cascade.

use chrono::Utc;
use std::fmt;
use std::process::ExitStatus;
use tokio::sync::mpsc;

use netweave_core::{
    Bridge, Cidr, Container, Error, FabricEvent, IfName, InterfaceState, Namespace, NetConfig,
    ResourceId, ResourceKind, ResourceName, Result, Veth, VethEnd,
};
use netweave_store::RecordStore;

use crate::{Kernel, NamespaceRegistry, Stores};

/// A cleanup step that failed during a cascading delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// Kind of resource that could not be removed
    pub kind: ResourceKind,
    /// Its name
    pub name: String,
    /// Why
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.name, self.message)
    }
}

/// Outcome of a successful container delete
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Non-fatal failures, in the order they happened
    pub warnings: Vec<CleanupWarning>,
}

impl DeleteReport {
    /// Whether every step succeeded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Creates, grows, runs commands in and deletes containers
pub struct ContainerManager {
    config: NetConfig,
    kernel: Kernel,
    stores: Stores,
    registry: NamespaceRegistry,
    event_tx: Option<mpsc::UnboundedSender<FabricEvent>>,
}

impl ContainerManager {
    /// Create a manager over `kernel`, persisting into `stores`
    #[must_use]
    pub fn new(config: NetConfig, kernel: Kernel, stores: Stores) -> Self {
        let registry = NamespaceRegistry::new(kernel.namespaces.clone(), stores.namespaces.clone());
        Self {
            config,
            kernel,
            stores,
            registry,
            event_tx: None,
        }
    }

    /// Manager for the running kernel with JSON records under the state directory
    #[must_use]
    pub fn system(config: NetConfig) -> Self {
        let kernel = Kernel::system(&config);
        let stores = Stores::json(&config);
        Self::new(config, kernel, stores)
    }

    /// Also send every lifecycle event to `tx`
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<FabricEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Namespace registry backing this manager
    #[must_use]
    pub const fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    fn emit(&self, event: FabricEvent) {
        event.emit_trace();
        if let Some(tx) = &self.event_tx {
            // Receiver gone: nobody is listening any more
            let _ = tx.send(event);
        }
    }

    /// The container's namespace, or `NotFound` if it has none
    pub fn namespace_of(container: &Container) -> Result<&Namespace> {
        container.namespace.as_ref().ok_or_else(|| {
            Error::not_found(
                ResourceKind::Namespace,
                format!("{} (container has no namespace)", container.name),
            )
        })
    }

    /// Create a container with a fresh namespace and no links
    pub fn create(&self, name: &ResourceName) -> Result<Container> {
        if self.stores.containers.find_by_name(name.as_str())?.is_some() {
            return Err(Error::already_exists(ResourceKind::Container, name.as_str()));
        }

        let namespace = self.registry.create(name)?;

        let mut container = Container::new(name.clone());
        container.namespace = Some(namespace.clone());

        if let Err(e) = self.stores.containers.save(&container) {
            if let Err(cleanup) = self
                .registry
                .unbind(&namespace)
                .and_then(|()| self.registry.forget(&namespace))
            {
                tracing::warn!(
                    container = %name,
                    error = %cleanup,
                    "Failed to remove namespace after failed save"
                );
            }
            return Err(e);
        }

        self.emit(FabricEvent::ContainerCreated {
            id: container.id.clone(),
            name: name.to_string(),
            timestamp: Utc::now(),
        });

        Ok(container)
    }

    /// All containers, oldest first
    pub fn list(&self) -> Result<Vec<Container>> {
        let mut containers = self.stores.containers.list()?;
        containers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(containers)
    }

    /// Container by name or unique ID prefix
    pub fn find(&self, ident: &str) -> Result<Container> {
        self.stores.containers.resolve(ident)
    }

    /// Create a bridge inside the container's namespace
    pub fn add_bridge(&self, container: &mut Container, name: &IfName) -> Result<Bridge> {
        let namespace = Self::namespace_of(container)?.clone();

        self.kernel.bridges.create(name, &namespace.path)?;

        let bridge = Bridge::new(name.clone(), namespace);
        self.stores.bridges.save(&bridge)?;
        container.bridges.push(bridge.clone());
        self.stores.containers.save(container)?;

        self.emit(FabricEvent::BridgeAdded {
            id: container.id.clone(),
            bridge: name.to_string(),
            timestamp: Utc::now(),
        });

        Ok(bridge)
    }

    /// Create a veth pair owned by the container
    ///
    /// Both ends start out in the reference namespace.
    pub fn add_veth(&self, container: &mut Container, name_a: &IfName, name_b: &IfName) -> Result<Veth> {
        if name_a == name_b {
            return Err(Error::invalid(format!(
                "Veth ends must have different names, got '{name_a}' twice"
            )));
        }

        self.kernel.links.create_pair(name_a, name_b)?;

        let veth = Veth::new(name_a.clone(), name_b.clone());
        self.stores.veths.save(&veth)?;
        container.veths.push(veth.clone());
        self.stores.containers.save(container)?;

        self.emit(FabricEvent::VethAdded {
            id: container.id.clone(),
            name_a: name_a.to_string(),
            name_b: name_b.to_string(),
            timestamp: Utc::now(),
        });

        Ok(veth)
    }

    /// Move one end of a veth owned by `owner` into `target`
    pub fn move_veth_end(&self, owner: &mut Container, ifname: &IfName, target: &Namespace) -> Result<()> {
        let owner_id = owner.id.clone();
        let veth = owner
            .veth_mut(ifname.as_str())
            .ok_or_else(|| Error::not_found(ResourceKind::Veth, ifname.as_str()))?;
        let end = veth
            .end_by_name(ifname.as_str())
            .ok_or_else(|| Error::not_found(ResourceKind::Veth, ifname.as_str()))?;

        self.kernel.links.move_end(ifname, &target.path)?;

        veth.set_namespace(end, target.clone());
        let veth = veth.clone();
        self.stores.veths.save(&veth)?;
        self.stores.containers.save(owner)?;

        self.emit(FabricEvent::VethMoved {
            id: owner_id,
            ifname: ifname.to_string(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Enslave an interface in the container's namespace to one of its bridges
    pub fn attach_interface(&self, container: &mut Container, bridge: &IfName, ifname: &IfName) -> Result<()> {
        let namespace = Self::namespace_of(container)?.path.clone();
        if container.bridge(bridge.as_str()).is_none() {
            return Err(Error::not_found(ResourceKind::Bridge, bridge.as_str()));
        }

        self.kernel
            .bridges
            .attach_interface(bridge, ifname, &namespace)?;

        if let Some(record) = container.bridge_mut(bridge.as_str()) {
            record.record_port(ifname.clone());
            let record = record.clone();
            self.stores.bridges.save(&record)?;
        }
        self.stores.containers.save(container)?;

        self.emit(FabricEvent::InterfaceAttached {
            id: container.id.clone(),
            bridge: bridge.to_string(),
            ifname: ifname.to_string(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Bring one end of the container's own veth into its namespace and
    /// attach it to one of its bridges
    pub fn connect_veth_to_bridge(&self, container: &mut Container, ifname: &IfName, bridge: &IfName) -> Result<()> {
        let namespace = Self::namespace_of(container)?.clone();
        let veth = container
            .veth(ifname.as_str())
            .ok_or_else(|| Error::not_found(ResourceKind::Veth, ifname.as_str()))?;
        let already_home = veth
            .end_by_name(ifname.as_str())
            .and_then(|end| veth.namespace_of(end))
            .is_some_and(|ns| ns.path == namespace.path);

        if !already_home {
            self.move_veth_end(container, ifname, &namespace)?;
        }

        self.attach_interface(container, bridge, ifname)
    }

    /// Assign an address to an interface in the container's namespace and
    /// bring it up
    pub fn assign_address(&self, container: &Container, ifname: &IfName, cidr: &Cidr) -> Result<()> {
        let namespace = Self::namespace_of(container)?;

        self.kernel
            .links
            .assign_address(ifname, cidr, &namespace.path)?;

        self.emit(FabricEvent::AddressAssigned {
            id: container.id.clone(),
            ifname: ifname.to_string(),
            address: *cidr,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Run a command inside the container's namespace
    pub fn exec(&self, container: &Container, argv: &[String]) -> Result<ExitStatus> {
        let namespace = Self::namespace_of(container)?;
        self.kernel.namespaces.exec(&namespace.path, argv)
    }

    /// Open an interactive shell inside the container's namespace
    pub fn attach(&self, container: &Container) -> Result<ExitStatus> {
        let namespace = Self::namespace_of(container)?;
        self.kernel
            .namespaces
            .attach(&namespace.path, container.name.as_str())
    }

    /// Interface state inside the container's namespace
    pub fn interfaces(&self, container: &Container) -> Result<Vec<InterfaceState>> {
        let namespace = Self::namespace_of(container)?;
        self.kernel.links.interfaces(&namespace.path)
    }

    /// Delete the container: bridges, then veths, then the namespace, then
    /// the records
    ///
    /// Only failing to remove the container record is an error; everything
    /// else is reported as a warning.
    pub fn delete(&self, container: &Container) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();
        let mut warn = |kind: ResourceKind, name: &str, err: &Error| {
            let warning = CleanupWarning {
                kind,
                name: name.to_string(),
                message: err.to_string(),
            };
            self.emit(FabricEvent::CleanupWarning {
                id: container.id.clone(),
                message: warning.to_string(),
                timestamp: Utc::now(),
            });
            report.warnings.push(warning);
        };

        for bridge in &container.bridges {
            if let Err(e) = self
                .kernel
                .bridges
                .delete(&bridge.name, &bridge.namespace.path)
            {
                warn(ResourceKind::Bridge, bridge.name.as_str(), &e);
            }
        }

        for veth in &container.veths {
            if let Err(e) = self.delete_veth(veth) {
                warn(ResourceKind::Veth, veth.name_a.as_str(), &e);
            }
        }

        if let Some(namespace) = &container.namespace {
            if let Err(e) = self.registry.unbind(namespace) {
                warn(ResourceKind::Namespace, namespace.name.as_str(), &e);
            }
        }

        for bridge in &container.bridges {
            if let Err(e) = forget(self.stores.bridges.as_ref(), &bridge.id) {
                warn(ResourceKind::Bridge, bridge.name.as_str(), &e);
            }
        }
        for veth in &container.veths {
            if let Err(e) = forget(self.stores.veths.as_ref(), &veth.id) {
                warn(ResourceKind::Veth, veth.name_a.as_str(), &e);
            }
        }
        if let Some(namespace) = &container.namespace {
            if let Err(e) = self.registry.forget(namespace).or_else(ignore_not_found) {
                warn(ResourceKind::Namespace, namespace.name.as_str(), &e);
            }
        }

        self.stores.containers.delete(&container.id)?;

        self.emit(FabricEvent::ContainerDeleted {
            id: container.id.clone(),
            warnings: report.warnings.len(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    /// Delete every container, continuing past failures
    pub fn delete_all(&self) -> Result<Vec<(Container, Result<DeleteReport>)>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|container| {
                let outcome = self.delete(&container);
                (container, outcome)
            })
            .collect())
    }

    /// Remove whichever end of the pair is still reachable; the peer goes
    /// with it
    fn delete_veth(&self, veth: &Veth) -> Result<()> {
        let mut last = None;

        for end in [VethEnd::A, VethEnd::B] {
            let namespace = veth
                .namespace_of(end)
                .map_or_else(|| self.config.reference(), |ns| ns.path.as_path());

            match self.kernel.links.delete(veth.end_name(end), namespace) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => last = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last.unwrap_or_else(|| Error::not_found(ResourceKind::Veth, veth.name_a.as_str())))
    }
}

impl fmt::Debug for ContainerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Delete a record that may already be gone
fn forget<R: netweave_core::Record>(store: &dyn RecordStore<R>, id: &ResourceId) -> Result<()> {
    store.delete(id).or_else(ignore_not_found)
}

fn ignore_not_found(err: Error) -> Result<()> {
    if err.is_not_found() { Ok(()) } else { Err(err) }
}
