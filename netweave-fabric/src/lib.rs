//! Virtual network fabric: containers, topologies and their lifecycle
//!
//! This crate composes the namespace, link and bridge operations into the
//! units users work with:
//! - [`NamespaceRegistry`] - persisted named namespaces
//! - [`ContainerManager`] - a namespace with its bridges and veths, created,
//!   grown and torn down as one unit
//! - [`Topology`] and [`TopologyBuilder`] - declarative host/switch graphs
//! - [`MockKernel`] - in-memory kernel model for testing without root

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod lifecycle;
pub mod mock;
pub mod registry;
pub mod services;
pub mod topology;

pub use builder::{BuiltTopology, TopologyBuilder};
pub use lifecycle::{CleanupWarning, ContainerManager, DeleteReport};
pub use mock::MockKernel;
pub use registry::NamespaceRegistry;
pub use services::{Kernel, Stores};
pub use topology::{Link, Node, NodeKind, Topology};

// Re-export commonly used types
pub use netweave_core::{Container, Error, NetConfig, Result};
