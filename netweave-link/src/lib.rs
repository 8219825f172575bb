//! Link-layer plumbing over rtnetlink
//!
//! This crate provides the kernel-backed link and bridge operations:
//! - [`VethManager`] - veth pairs, moving ends, addresses, interface state
//! - [`BridgeManager`] - bridges and bridge ports
//!
//! Every request is issued from inside the relevant namespace through
//! [`netweave_namespace::with_namespace`].

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod bridge;
mod netlink;
pub mod veth;

pub use bridge::BridgeManager;
pub use veth::VethManager;
