//! Topology builder
//!
//! Turns a [`Topology`] into kernel state in two phases:
//!
//! 1. Nodes: one container (and namespace) per node, plus a `br-<node>`
//!    bridge for switches.
//! 2. Links: a veth pair per link created in the reference namespace, each
//!    end moved into its node's namespace, switch ends attached to the
//!    switch bridge, host ends given their address.
//!
//! The first failure stops the build and is returned wrapped with the node
//! or link being built. Nothing already created is rolled back.

use std::collections::BTreeMap;

use netweave_core::{Cidr, Container, Error, IfName, ResourceKind, ResourceName, Result};

use crate::{ContainerManager, Link, Node, NodeKind, Topology};

/// Containers created by a build, keyed by node name
#[derive(Debug, Clone, Default)]
pub struct BuiltTopology {
    /// One container per node
    pub containers: BTreeMap<ResourceName, Container>,
}

impl BuiltTopology {
    /// Container built for `node`
    #[must_use]
    pub fn container(&self, node: &str) -> Option<&Container> {
        self.containers
            .iter()
            .find(|(name, _)| name.as_str() == node)
            .map(|(_, c)| c)
    }
}

/// Materializes topologies through a [`ContainerManager`]
#[derive(Debug)]
pub struct TopologyBuilder<'a> {
    manager: &'a ContainerManager,
}

impl<'a> TopologyBuilder<'a> {
    /// Create a builder
    #[must_use]
    pub const fn new(manager: &'a ContainerManager) -> Self {
        Self { manager }
    }

    /// Build every node, then every link
    ///
    /// The topology is validated before anything is created.
    pub fn build(&self, topology: &Topology) -> Result<BuiltTopology> {
        topology.validate()?;

        tracing::info!(
            nodes = topology.nodes.len(),
            links = topology.links.len(),
            "Building topology"
        );

        let mut built = BuiltTopology::default();

        for (name, node) in &topology.nodes {
            let container = self
                .build_node(node)
                .map_err(|e| e.in_topology(format!("node '{name}'")))?;
            built.containers.insert(name.clone(), container);
        }

        for link in &topology.links {
            self.build_link(topology, link, &mut built)
                .map_err(|e| e.in_topology(format!("link {}", link.label())))?;
        }

        tracing::info!(containers = built.containers.len(), "Topology built");
        Ok(built)
    }

    fn build_node(&self, node: &Node) -> Result<Container> {
        let mut container = self.manager.create(&node.name)?;

        if node.kind == NodeKind::Switch {
            let bridge = node.bridge_name()?;
            self.manager.add_bridge(&mut container, &bridge)?;
        }

        tracing::debug!(node = %node.name, kind = %node.kind, "Node built");
        Ok(container)
    }

    fn build_link(&self, topology: &Topology, link: &Link, built: &mut BuiltTopology) -> Result<()> {
        let (if_a, if_b) = link.interface_names()?;
        let kind_a = node_kind(topology, &link.a)?;
        let kind_b = node_kind(topology, &link.b)?;

        let mut a = take(built, &link.a)?;
        let mut b = take(built, &link.b)?;
        let result = self.wire(
            &mut a,
            &mut b,
            (&if_a, kind_a, link.addr_a.as_ref()),
            (&if_b, kind_b, link.addr_b.as_ref()),
        );
        built.containers.insert(link.a.clone(), a);
        built.containers.insert(link.b.clone(), b);
        result?;

        tracing::debug!(a = %link.a, b = %link.b, "Link built");
        Ok(())
    }

    fn wire(
        &self,
        a: &mut Container,
        b: &mut Container,
        end_a: (&IfName, NodeKind, Option<&Cidr>),
        end_b: (&IfName, NodeKind, Option<&Cidr>),
    ) -> Result<()> {
        let (if_a, if_b) = (end_a.0, end_b.0);

        // The pair belongs to endpoint A's container
        self.manager.add_veth(a, if_a, if_b)?;

        let ns_a = ContainerManager::namespace_of(a)?.clone();
        let ns_b = ContainerManager::namespace_of(b)?.clone();
        self.manager.move_veth_end(a, if_a, &ns_a)?;
        self.manager.move_veth_end(a, if_b, &ns_b)?;

        for (container, (ifname, kind, addr)) in [(&mut *a, end_a), (&mut *b, end_b)] {
            match kind {
                NodeKind::Switch => {
                    let bridge = container
                        .bridges
                        .first()
                        .map(|br| br.name.clone())
                        .ok_or_else(|| {
                            Error::not_found(ResourceKind::Bridge, format!("br-{}", container.name))
                        })?;
                    if addr.is_some() {
                        tracing::warn!(
                            ifname = %ifname,
                            bridge = %bridge,
                            "Ignoring address on a switch port"
                        );
                    }
                    self.manager.attach_interface(container, &bridge, ifname)?;
                }
                NodeKind::Host => {
                    if let Some(cidr) = addr {
                        self.manager.assign_address(container, ifname, cidr)?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn node_kind(topology: &Topology, name: &ResourceName) -> Result<NodeKind> {
    topology
        .node(name)
        .map(|n| n.kind)
        .ok_or_else(|| Error::not_found(ResourceKind::Node, name.as_str()))
}

fn take(built: &mut BuiltTopology, name: &ResourceName) -> Result<Container> {
    built
        .containers
        .remove(name)
        .ok_or_else(|| Error::not_found(ResourceKind::Container, name.as_str()))
}
