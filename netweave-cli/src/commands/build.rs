//! Build command implementation

use anyhow::{Context, Result};
use netweave_fabric::{ContainerManager, Topology, TopologyBuilder};
use std::path::Path;

use super::require_root;

pub fn execute(manager: &ContainerManager, file: Option<&Path>, check: bool) -> Result<()> {
    let topology = match file {
        Some(path) => Topology::from_file(path)
            .with_context(|| format!("Failed to load topology from {}", path.display()))?,
        None => Topology::demo(),
    };

    topology.validate().context("Invalid topology")?;

    if check {
        println!(
            "✅ Topology is valid: {} node(s), {} link(s)",
            topology.nodes.len(),
            topology.links.len()
        );
        return Ok(());
    }

    require_root("build")?;

    // Partial builds are left in place; `netweave cleanup` removes them
    let built = TopologyBuilder::new(manager)
        .build(&topology)
        .context("Failed to build topology")?;

    println!("✅ Built {} container(s)", built.containers.len());
    for (name, container) in &built.containers {
        let kind = topology
            .node(name)
            .map_or_else(String::new, |node| node.kind.to_string());
        println!("   {} {name} ({kind})", container.id.short());
    }

    Ok(())
}
