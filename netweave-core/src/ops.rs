//! Kernel-operation traits for pluggable implementations
//!
//! Every trait here has two implementations:
//! - the production one, talking to the kernel (`netweave-namespace`,
//!   `netweave-link`)
//! - `MockKernel` in `netweave-fabric`, an in-memory model used to test
//!   lifecycle and topology logic without root
//!
//! Namespaces are always addressed by their filesystem path, the only
//! kernel-level handle a namespace has.
//!
//! # Thread Safety
//! All implementations must be `Send + Sync`. None of them may change the
//! namespace of the calling thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::ExitStatus;

use crate::{Cidr, IfName, Namespace, ResourceName, Result};

/// Namespace lifecycle and process execution
pub trait NamespaceOps: Send + Sync {
    /// Create a namespace bound to a stable path derived from `name`
    ///
    /// # Errors
    /// Returns `AlreadyExists` if a namespace with that name is already bound
    fn create(&self, name: &ResourceName) -> Result<Namespace>;

    /// Release the binding and remove the path
    ///
    /// # Errors
    /// Returns `NotFound` if nothing is bound at `path`, or a kernel error if
    /// the namespace is still in use
    fn delete(&self, path: &Path) -> Result<()>;

    /// Whether a namespace is bound at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Run `argv` inside the namespace with inherited standard streams
    ///
    /// # Errors
    /// Returns error if the namespace cannot be entered or the command
    /// cannot be spawned
    fn exec(&self, path: &Path, argv: &[String]) -> Result<ExitStatus>;

    /// Open an interactive shell in the namespace, with its hostname set to
    /// `name`, and wait for it to exit
    ///
    /// # Errors
    /// Returns error if the attach child cannot be spawned
    fn attach(&self, path: &Path, name: &str) -> Result<ExitStatus>;
}

/// Veth pairs, addresses and interface inspection
pub trait LinkOps: Send + Sync {
    /// Create a veth pair in the reference namespace
    ///
    /// # Errors
    /// Returns `AlreadyExists` if either name is taken in the reference namespace
    fn create_pair(&self, name_a: &IfName, name_b: &IfName) -> Result<()>;

    /// Move an interface from the reference namespace into `target`
    ///
    /// # Errors
    /// Returns `NotFound` if the interface is not visible from the reference
    /// namespace
    fn move_end(&self, ifname: &IfName, target: &Path) -> Result<()>;

    /// Add `cidr` to an interface in `namespace` and bring it up
    ///
    /// # Errors
    /// Returns `NotFound` if the interface is absent from `namespace`
    fn assign_address(&self, ifname: &IfName, cidr: &Cidr, namespace: &Path) -> Result<()>;

    /// Delete an interface in `namespace`; deleting a veth end removes its peer
    ///
    /// # Errors
    /// Returns `NotFound` if the interface is absent from `namespace`
    fn delete(&self, ifname: &IfName, namespace: &Path) -> Result<()>;

    /// State of one interface in `namespace`
    ///
    /// # Errors
    /// Returns `NotFound` if the interface is absent from `namespace`
    fn interface(&self, ifname: &str, namespace: &Path) -> Result<InterfaceState>;

    /// State of every interface in `namespace`
    ///
    /// # Errors
    /// Returns error if the namespace cannot be entered
    fn interfaces(&self, namespace: &Path) -> Result<Vec<InterfaceState>>;
}

/// Bridge devices scoped to one namespace
pub trait BridgeOps: Send + Sync {
    /// Create a bridge in `namespace` and bring it up
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the name is taken in `namespace`
    fn create(&self, name: &IfName, namespace: &Path) -> Result<()>;

    /// Enslave `ifname` to `bridge` and bring it up
    ///
    /// # Errors
    /// Returns `NotFound` if either device is absent from `namespace`
    fn attach_interface(&self, bridge: &IfName, ifname: &IfName, namespace: &Path) -> Result<()>;

    /// Delete the bridge; succeeds when `namespace` is already gone
    ///
    /// # Errors
    /// Returns error if the namespace exists and the bridge cannot be deleted
    fn delete(&self, name: &IfName, namespace: &Path) -> Result<()>;
}

/// Observable state of one network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    /// Interface name
    pub name: String,
    /// Kernel interface index
    pub index: u32,
    /// Link kind (`veth`, `bridge`, ...) when reported
    pub kind: Option<String>,
    /// Administratively up
    pub up: bool,
    /// Name of the bridge this interface is enslaved to
    pub master: Option<String>,
    /// Assigned addresses
    pub addresses: Vec<Cidr>,
}

impl InterfaceState {
    /// Whether `cidr` is assigned to this interface
    #[must_use]
    pub fn has_address(&self, cidr: &Cidr) -> bool {
        self.addresses.contains(cidr)
    }
}

impl fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} <{}>",
            self.index,
            self.name,
            if self.up { "UP" } else { "DOWN" }
        )?;
        if let Some(kind) = &self.kind {
            write!(f, " {kind}")?;
        }
        if let Some(master) = &self.master {
            write!(f, " master {master}")?;
        }
        for addr in &self.addresses {
            write!(f, " inet {addr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_state_display() {
        let state = InterfaceState {
            name: "h1-s1".to_string(),
            index: 7,
            kind: Some("veth".to_string()),
            up: true,
            master: None,
            addresses: vec!["10.0.0.1/24".parse().unwrap()],
        };

        assert!(state.has_address(&"10.0.0.1/24".parse().unwrap()));
        assert_eq!(state.to_string(), "7: h1-s1 <UP> veth inet 10.0.0.1/24");
    }

    #[test]
    fn test_bridge_port_display() {
        let state = InterfaceState {
            name: "s1-h1".to_string(),
            index: 3,
            kind: None,
            up: false,
            master: Some("br-s1".to_string()),
            addresses: Vec::new(),
        };

        assert_eq!(state.to_string(), "3: s1-h1 <DOWN> master br-s1");
    }
}
