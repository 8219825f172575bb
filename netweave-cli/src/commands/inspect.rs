//! Inspect command implementation

use anyhow::{Context, Result};
use netweave_fabric::ContainerManager;

use super::require_root;

pub fn execute(manager: &ContainerManager, ident: &str) -> Result<()> {
    let container = manager
        .find(ident)
        .with_context(|| format!("No such container: {ident}"))?;

    println!("\n📦 Container {} ({})", container.name, container.id);
    println!("{:-<60}", "");
    println!("Created:   {}", container.created_at.to_rfc3339());
    match &container.namespace {
        Some(ns) => println!("Namespace: {}", ns.path.display()),
        None => println!("Namespace: -"),
    }

    for bridge in &container.bridges {
        let ports: Vec<_> = bridge.interfaces.iter().map(|p| p.as_str()).collect();
        println!("Bridge:    {} [{}]", bridge.name, ports.join(", "));
    }
    for veth in &container.veths {
        let place = |ns: Option<&netweave_core::Namespace>| {
            ns.map_or_else(|| "reference".to_string(), |ns| ns.name.to_string())
        };
        println!(
            "Veth:      {} ({}) <-> {} ({})",
            veth.name_a,
            place(veth.namespace_a.as_ref()),
            veth.name_b,
            place(veth.namespace_b.as_ref())
        );
    }

    require_root("inspect")?;

    let interfaces = manager
        .interfaces(&container)
        .with_context(|| format!("Failed to read interfaces of '{}'", container.name))?;

    println!("\n🔌 Interfaces");
    println!("{:-<60}", "");
    for interface in interfaces {
        println!("  {interface}");
    }

    Ok(())
}
