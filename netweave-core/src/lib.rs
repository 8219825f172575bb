//! Netweave Core - Foundation types shared by every fabric crate
//!
//! This crate provides the error taxonomy, validated identifiers, the
//! persisted resource records and the kernel-operation traits that the
//! namespace, link and fabric crates implement and consume.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod ops;
pub mod records;
pub mod types;

pub use config::NetConfig;
pub use error::{Error, ResourceKind, Result};
pub use events::FabricEvent;
pub use ops::{BridgeOps, InterfaceState, LinkOps, NamespaceOps};
pub use records::{Bridge, Container, Namespace, Record, Veth, VethEnd};
pub use types::{Cidr, IfName, ResourceId, ResourceName};
