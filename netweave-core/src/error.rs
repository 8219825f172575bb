//! Error types for Netweave

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of resource an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Network namespace
    Namespace,
    /// Veth pair
    Veth,
    /// Bridge device
    Bridge,
    /// Container bundle
    Container,
    /// Any network interface looked up by name
    Interface,
    /// Topology node
    Node,
}

impl ResourceKind {
    /// Lowercase name used in messages and store directories
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Veth => "veth",
            Self::Bridge => "bridge",
            Self::Container => "container",
            Self::Interface => "interface",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Netweave error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A privileged kernel operation failed
    #[error("{operation} failed for '{target}': {message}")]
    KernelOperation {
        /// Operation that failed (e.g. "veth add")
        operation: String,
        /// Target identifier (device, namespace path)
        target: String,
        /// Underlying error message
        message: String,
    },

    /// Referenced resource does not exist
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Resource kind
        kind: ResourceKind,
        /// Name, id or path that was looked up
        name: String,
    },

    /// Resource with this name already exists
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Resource kind
        kind: ResourceKind,
        /// Conflicting name
        name: String,
    },

    /// Malformed input (CIDR, names, topology)
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// Topology build step failed
    #[error("{context}: {source}")]
    Topology {
        /// Failing node or link
        context: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Metadata persistence failed
    #[error("Store error: {message}")]
    Store {
        /// Error message
        message: String,
    },

    /// The pinned namespace worker panicked
    #[error("Namespace worker for '{target}' panicked")]
    WorkerPanicked {
        /// Namespace path the worker was operating in
        target: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::KernelOperation`] from any displayable cause
    pub fn kernel(
        operation: impl Into<String>,
        target: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::KernelOperation {
            operation: operation.into(),
            target: target.into(),
            message: cause.to_string(),
        }
    }

    /// Build a [`Error::NotFound`]
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Build a [`Error::AlreadyExists`]
    pub fn already_exists(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Build a [`Error::InvalidInput`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap this error with the topology node or link that failed
    #[must_use]
    pub fn in_topology(self, context: impl Into<String>) -> Self {
        Self::Topology {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through topology wrapping
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Topology { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the referenced resource did not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Whether the resource already existed
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), Self::AlreadyExists { .. })
    }
}

/// Result type alias for Netweave operations
pub type Result<T> = std::result::Result<T, Error>;
