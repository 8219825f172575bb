//! Fabric lifecycle events with structured tracing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Cidr, ResourceId};

/// Events emitted while containers and their links are built or torn down
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FabricEvent {
    /// Container and its namespace created
    ContainerCreated {
        /// Container ID
        id: ResourceId,
        /// Container name
        name: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Bridge created inside a container namespace
    BridgeAdded {
        /// Container ID
        id: ResourceId,
        /// Bridge name
        bridge: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Veth pair created in the reference namespace
    VethAdded {
        /// Owning container ID
        id: ResourceId,
        /// End A
        name_a: String,
        /// End B
        name_b: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Veth end moved into a container namespace
    VethMoved {
        /// Container ID receiving the end
        id: ResourceId,
        /// Interface name
        ifname: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Interface enslaved to a bridge
    InterfaceAttached {
        /// Container ID
        id: ResourceId,
        /// Bridge name
        bridge: String,
        /// Port name
        ifname: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Address assigned to an interface
    AddressAssigned {
        /// Container ID
        id: ResourceId,
        /// Interface name
        ifname: String,
        /// Address
        address: Cidr,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// A best-effort cleanup step failed
    CleanupWarning {
        /// Container ID
        id: ResourceId,
        /// What could not be removed and why
        message: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },

    /// Container deleted
    ContainerDeleted {
        /// Container ID
        id: ResourceId,
        /// Number of cleanup warnings
        warnings: usize,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
}

impl FabricEvent {
    /// Get the container ID from any event
    #[must_use]
    pub const fn container_id(&self) -> &ResourceId {
        match self {
            Self::ContainerCreated { id, .. }
            | Self::BridgeAdded { id, .. }
            | Self::VethAdded { id, .. }
            | Self::VethMoved { id, .. }
            | Self::InterfaceAttached { id, .. }
            | Self::AddressAssigned { id, .. }
            | Self::CleanupWarning { id, .. }
            | Self::ContainerDeleted { id, .. } => id,
        }
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::ContainerCreated { id, name, .. } => {
                tracing::info!(
                    container_id = %id,
                    container = %name,
                    event = "container_created",
                    "Container created"
                );
            }
            Self::BridgeAdded { id, bridge, .. } => {
                tracing::info!(
                    container_id = %id,
                    bridge = %bridge,
                    event = "bridge_added",
                    "Bridge added"
                );
            }
            Self::VethAdded {
                id, name_a, name_b, ..
            } => {
                tracing::info!(
                    container_id = %id,
                    name_a = %name_a,
                    name_b = %name_b,
                    event = "veth_added",
                    "Veth pair added"
                );
            }
            Self::VethMoved { id, ifname, .. } => {
                tracing::debug!(
                    container_id = %id,
                    ifname = %ifname,
                    event = "veth_moved",
                    "Veth end moved"
                );
            }
            Self::InterfaceAttached {
                id, bridge, ifname, ..
            } => {
                tracing::debug!(
                    container_id = %id,
                    bridge = %bridge,
                    ifname = %ifname,
                    event = "interface_attached",
                    "Interface attached to bridge"
                );
            }
            Self::AddressAssigned {
                id,
                ifname,
                address,
                ..
            } => {
                tracing::debug!(
                    container_id = %id,
                    ifname = %ifname,
                    address = %address,
                    event = "address_assigned",
                    "Address assigned"
                );
            }
            Self::CleanupWarning { id, message, .. } => {
                tracing::warn!(
                    container_id = %id,
                    message = %message,
                    event = "cleanup_warning",
                    "Cleanup step failed"
                );
            }
            Self::ContainerDeleted { id, warnings, .. } => {
                tracing::info!(
                    container_id = %id,
                    warnings,
                    event = "container_deleted",
                    "Container deleted"
                );
            }
        }
    }
}

impl fmt::Display for FabricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainerCreated { id, name, .. } => {
                write!(f, "Container {id} ({name}) created")
            }
            Self::BridgeAdded { id, bridge, .. } => {
                write!(f, "Container {id} bridge {bridge} added")
            }
            Self::VethAdded {
                id, name_a, name_b, ..
            } => write!(f, "Container {id} veth {name_a}<->{name_b} added"),
            Self::VethMoved { id, ifname, .. } => {
                write!(f, "Container {id} received {ifname}")
            }
            Self::InterfaceAttached {
                id, bridge, ifname, ..
            } => write!(f, "Container {id} attached {ifname} to {bridge}"),
            Self::AddressAssigned {
                id,
                ifname,
                address,
                ..
            } => write!(f, "Container {id} assigned {address} to {ifname}"),
            Self::CleanupWarning { id, message, .. } => {
                write!(f, "Container {id} cleanup warning: {message}")
            }
            Self::ContainerDeleted { id, warnings, .. } => {
                write!(f, "Container {id} deleted with {warnings} warning(s)")
            }
        }
    }
}
