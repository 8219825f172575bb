//! Declarative topology model
//!
//! A topology is a set of named nodes (hosts or switches) and an ordered list
//! of point-to-point links between them. It is pure data: nothing here
//! touches the kernel. [`Topology::validate`] catches every structural
//! problem up front so a malformed graph is rejected before the builder
//! creates anything.
//!
//! On disk a topology is JSON:
//!
//! ```json
//! {
//!   "nodes": [{"name": "h1", "kind": "host"}, {"name": "s1", "kind": "switch"}],
//!   "links": [{"a": "h1", "b": "s1", "addr_a": "10.0.0.1/24"}]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use netweave_core::{Cidr, Error, IfName, ResourceKind, ResourceName, Result};

/// What a node becomes when built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Endpoint that may carry addresses
    Host,
    /// Namespace with a bridge joining all its links
    Switch,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Switch => write!(f, "switch"),
        }
    }
}

/// A named node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node name, also the container and namespace name
    pub name: ResourceName,
    /// Host or switch
    pub kind: NodeKind,
}

impl Node {
    /// Name of the bridge a switch node gets
    pub fn bridge_name(&self) -> Result<IfName> {
        IfName::new(format!("br-{}", self.name))
    }
}

/// A link between two nodes, with optional addresses for each end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// First endpoint
    pub a: ResourceName,
    /// Second endpoint
    pub b: ResourceName,
    /// Address for the end in `a`
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub addr_a: Option<Cidr>,
    /// Address for the end in `b`
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub addr_b: Option<Cidr>,
}

impl Link {
    /// Interface names for the two ends: `<a>-<b>` lives in `a`, `<b>-<a>` in `b`
    pub fn interface_names(&self) -> Result<(IfName, IfName)> {
        let name_a = IfName::new(format!("{}-{}", self.a, self.b))?;
        let name_b = IfName::new(format!("{}-{}", self.b, self.a))?;
        Ok((name_a, name_b))
    }

    /// Human-readable label used in error context
    #[must_use]
    pub fn label(&self) -> String {
        format!("'{}'<->'{}'", self.a, self.b)
    }
}

/// Accept `""` as "no address"
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<Cidr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// On-disk shape
#[derive(Debug, Serialize, Deserialize)]
struct TopologyFile {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Nodes keyed by name plus an ordered list of links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Nodes, iterated in name order
    pub nodes: BTreeMap<ResourceName, Node>,
    /// Links, built in this order
    pub links: Vec<Link>,
}

impl Topology {
    /// Empty topology
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Two hosts behind one switch
    ///
    /// h1 (10.0.0.1/24) and h2 (10.0.0.2/24) both link to s1.
    #[must_use]
    pub fn demo() -> Self {
        let name = |s: &str| ResourceName::new(s).ok();
        let cidr = |s: &str| s.parse::<Cidr>().ok();
        let mut topology = Self::new();

        if let (Some(h1), Some(h2), Some(s1)) = (name("h1"), name("h2"), name("s1")) {
            for (node, kind) in [(&h1, NodeKind::Host), (&h2, NodeKind::Host), (&s1, NodeKind::Switch)] {
                topology.nodes.insert(
                    node.clone(),
                    Node {
                        name: node.clone(),
                        kind,
                    },
                );
            }
            topology.links.push(Link {
                a: h1,
                b: s1.clone(),
                addr_a: cidr("10.0.0.1/24"),
                addr_b: None,
            });
            topology.links.push(Link {
                a: h2,
                b: s1,
                addr_a: cidr("10.0.0.2/24"),
                addr_b: None,
            });
        }

        topology
    }

    fn add_node(&mut self, name: &str, kind: NodeKind) -> Result<&mut Self> {
        let name = ResourceName::new(name)?;
        if self.nodes.contains_key(&name) {
            return Err(Error::already_exists(ResourceKind::Node, name.as_str()));
        }
        self.nodes.insert(name.clone(), Node { name, kind });
        Ok(self)
    }

    /// Add a host node
    pub fn add_host(&mut self, name: &str) -> Result<&mut Self> {
        self.add_node(name, NodeKind::Host)
    }

    /// Add a switch node
    pub fn add_switch(&mut self, name: &str) -> Result<&mut Self> {
        self.add_node(name, NodeKind::Switch)
    }

    /// Add a link; addresses are CIDR strings
    pub fn add_link(
        &mut self,
        a: &str,
        b: &str,
        addr_a: Option<&str>,
        addr_b: Option<&str>,
    ) -> Result<&mut Self> {
        let parse = |addr: Option<&str>| -> Result<Option<Cidr>> {
            addr.filter(|s| !s.is_empty()).map(str::parse).transpose()
        };

        self.links.push(Link {
            a: ResourceName::new(a)?,
            b: ResourceName::new(b)?,
            addr_a: parse(addr_a)?,
            addr_b: parse(addr_b)?,
        });
        Ok(self)
    }

    /// Node by name
    #[must_use]
    pub fn node(&self, name: &ResourceName) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Parse a JSON topology
    ///
    /// Duplicate node names are rejected here since the map would hide them.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TopologyFile = serde_json::from_str(json)
            .map_err(|e| Error::invalid(format!("Malformed topology: {e}")))?;

        let mut topology = Self::new();
        for node in file.nodes {
            if topology.nodes.contains_key(&node.name) {
                return Err(Error::invalid(format!(
                    "Duplicate node name '{}'",
                    node.name
                )));
            }
            topology.nodes.insert(node.name.clone(), node);
        }
        topology.links = file.links;

        Ok(topology)
    }

    /// Read a JSON topology file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        let file = TopologyFile {
            nodes: self.nodes.values().cloned().collect(),
            links: self.links.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Check the graph can be built without touching the kernel
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            if node.kind == NodeKind::Switch {
                node.bridge_name()
                    .map_err(|e| Error::invalid(format!("Switch '{}': {e}", node.name)))?;
            }
        }

        let mut pairs = HashSet::new();
        let mut interfaces = HashSet::new();

        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !self.nodes.contains_key(end) {
                    return Err(Error::invalid(format!(
                        "Link {} references unknown node '{end}'",
                        link.label()
                    )));
                }
            }

            if link.a == link.b {
                return Err(Error::invalid(format!(
                    "Link {} connects a node to itself",
                    link.label()
                )));
            }

            let pair = if link.a < link.b {
                (&link.a, &link.b)
            } else {
                (&link.b, &link.a)
            };
            if !pairs.insert(pair) {
                return Err(Error::invalid(format!("Duplicate link {}", link.label())));
            }

            let (name_a, name_b) = link
                .interface_names()
                .map_err(|e| Error::invalid(format!("Link {}: {e}", link.label())))?;
            for name in [name_a, name_b] {
                if !interfaces.insert(name.clone()) {
                    return Err(Error::invalid(format!(
                        "Link {} derives interface name '{name}' already used by another link",
                        link.label()
                    )));
                }
            }
        }

        Ok(())
    }
}
