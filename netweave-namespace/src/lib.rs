//! Network namespace management
//!
//! This crate provides the pieces every other fabric crate builds on:
//! - [`with_namespace`] - run a closure inside a namespace on a dedicated
//!   worker thread and restore the worker afterwards
//! - [`NetnsManager`] - create and delete bind-mounted named namespaces
//! - [`executor`] - one-shot commands and interactive attach

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod executor;
pub mod manager;
pub mod switch;

pub use executor::{ATTACH_AUTH_ENV, NSENTER_COMMAND, enter_and_exec_shell};
pub use manager::NetnsManager;
pub use switch::{current_netns_id, with_namespace};
