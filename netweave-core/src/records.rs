//! Persisted resource records
//!
//! Records describe kernel state that netweave created. They reference
//! namespaces by value so a record read back from the store is
//! self-contained: deleting a bridge only needs the bridge record.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::{IfName, ResourceId, ResourceKind, ResourceName};

/// Entity that can be kept in a record store
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind of resource, used for store layout and errors
    const KIND: ResourceKind;

    /// Unique record ID
    fn id(&self) -> &ResourceId;

    /// Human-facing name
    fn name(&self) -> &str;
}

/// A named network namespace bound to a filesystem path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Record ID
    pub id: ResourceId,
    /// Namespace name
    pub name: ResourceName,
    /// Bind-mount path, the only kernel-level handle
    pub path: PathBuf,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    /// Describe a freshly created namespace
    #[must_use]
    pub fn new(name: ResourceName, path: impl Into<PathBuf>) -> Self {
        Self {
            id: ResourceId::generate(),
            name,
            path: path.into(),
            created_at: Utc::now(),
        }
    }

    /// Bind-mount path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Record for Namespace {
    const KIND: ResourceKind = ResourceKind::Namespace;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// One end of a veth pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VethEnd {
    /// The end named `name_a`
    A,
    /// The end named `name_b`
    B,
}

impl fmt::Display for VethEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("a"),
            Self::B => f.write_str("b"),
        }
    }
}

/// A veth pair and where each end currently lives
///
/// An end whose namespace is `None` is still in the reference namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Veth {
    /// Record ID
    pub id: ResourceId,
    /// Name of end A
    pub name_a: IfName,
    /// Name of end B
    pub name_b: IfName,
    /// Namespace owning end A once moved
    pub namespace_a: Option<Namespace>,
    /// Namespace owning end B once moved
    pub namespace_b: Option<Namespace>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Veth {
    /// Describe a pair that was just created in the reference namespace
    #[must_use]
    pub fn new(name_a: IfName, name_b: IfName) -> Self {
        Self {
            id: ResourceId::generate(),
            name_a,
            name_b,
            namespace_a: None,
            namespace_b: None,
            created_at: Utc::now(),
        }
    }

    /// Interface name of `end`
    #[must_use]
    pub const fn end_name(&self, end: VethEnd) -> &IfName {
        match end {
            VethEnd::A => &self.name_a,
            VethEnd::B => &self.name_b,
        }
    }

    /// Namespace holding `end`, `None` while it is in the reference namespace
    #[must_use]
    pub const fn namespace_of(&self, end: VethEnd) -> Option<&Namespace> {
        match end {
            VethEnd::A => self.namespace_a.as_ref(),
            VethEnd::B => self.namespace_b.as_ref(),
        }
    }

    /// Record that `end` now lives in `namespace`
    pub fn set_namespace(&mut self, end: VethEnd, namespace: Namespace) {
        match end {
            VethEnd::A => self.namespace_a = Some(namespace),
            VethEnd::B => self.namespace_b = Some(namespace),
        }
    }

    /// Which end carries the interface name `ifname`
    #[must_use]
    pub fn end_by_name(&self, ifname: &str) -> Option<VethEnd> {
        if self.name_a.as_str() == ifname {
            Some(VethEnd::A)
        } else if self.name_b.as_str() == ifname {
            Some(VethEnd::B)
        } else {
            None
        }
    }
}

impl Record for Veth {
    const KIND: ResourceKind = ResourceKind::Veth;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn name(&self) -> &str {
        self.name_a.as_str()
    }
}

/// A bridge device inside one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    /// Record ID
    pub id: ResourceId,
    /// Device name
    pub name: IfName,
    /// Namespace the bridge lives in
    pub namespace: Namespace,
    /// Names of attached ports
    #[serde(default)]
    pub interfaces: Vec<IfName>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Bridge {
    /// Describe a bridge that was just created in `namespace`
    #[must_use]
    pub fn new(name: IfName, namespace: Namespace) -> Self {
        Self {
            id: ResourceId::generate(),
            name,
            namespace,
            interfaces: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Remember an attached port
    pub fn record_port(&mut self, ifname: IfName) {
        if !self.interfaces.contains(&ifname) {
            self.interfaces.push(ifname);
        }
    }
}

impl Record for Bridge {
    const KIND: ResourceKind = ResourceKind::Bridge;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// One topology node's resource bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Record ID
    pub id: ResourceId,
    /// Container name
    pub name: ResourceName,
    /// Exclusively owned namespace
    pub namespace: Option<Namespace>,
    /// Bridges inside the namespace
    #[serde(default)]
    pub bridges: Vec<Bridge>,
    /// Veth pairs owned by this container
    #[serde(default)]
    pub veths: Vec<Veth>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Container {
    /// An empty container without namespace
    #[must_use]
    pub fn new(name: ResourceName) -> Self {
        Self {
            id: ResourceId::generate(),
            name,
            namespace: None,
            bridges: Vec::new(),
            veths: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Bridge called `name`
    #[must_use]
    pub fn bridge(&self, name: &str) -> Option<&Bridge> {
        self.bridges.iter().find(|b| b.name.as_str() == name)
    }

    /// Mutable bridge called `name`
    pub fn bridge_mut(&mut self, name: &str) -> Option<&mut Bridge> {
        self.bridges.iter_mut().find(|b| b.name.as_str() == name)
    }

    /// Veth that has an end called `ifname`
    #[must_use]
    pub fn veth(&self, ifname: &str) -> Option<&Veth> {
        self.veths.iter().find(|v| v.end_by_name(ifname).is_some())
    }

    /// Mutable veth that has an end called `ifname`
    pub fn veth_mut(&mut self, ifname: &str) -> Option<&mut Veth> {
        self.veths
            .iter_mut()
            .find(|v| v.end_by_name(ifname).is_some())
    }

    /// Whether `ident` is this container's name or a prefix of its ID
    #[must_use]
    pub fn matches(&self, ident: &str) -> bool {
        self.name.as_str() == ident || self.id.matches_prefix(ident)
    }
}

impl Record for Container {
    const KIND: ResourceKind = ResourceKind::Container;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }
}
