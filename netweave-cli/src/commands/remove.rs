//! Remove command implementation

use anyhow::{Context, Result};
use netweave_fabric::ContainerManager;

use super::{print_report, require_root};

pub fn execute(manager: &ContainerManager, idents: &[String]) -> Result<()> {
    let containers = idents
        .iter()
        .map(|ident| {
            manager
                .find(ident)
                .with_context(|| format!("No such container: {ident}"))
        })
        .collect::<Result<Vec<_>>>()?;

    require_root("rm")?;

    for container in containers {
        tracing::info!(container = %container.name, "Removing container");

        let report = manager
            .delete(&container)
            .with_context(|| format!("Failed to remove container '{}'", container.name))?;
        print_report(&container, &report);
    }

    Ok(())
}
