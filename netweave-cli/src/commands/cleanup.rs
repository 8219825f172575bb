//! Cleanup command implementation

use anyhow::{Context, Result, bail};
use netweave_fabric::ContainerManager;

use super::{print_report, require_root};

pub fn execute(manager: &ContainerManager) -> Result<()> {
    if manager.list().context("Failed to read container records")?.is_empty() {
        println!("Nothing to clean up");
        return Ok(());
    }

    require_root("cleanup")?;

    let mut failed = 0;
    for (container, outcome) in manager.delete_all()? {
        match outcome {
            Ok(report) => print_report(&container, &report),
            Err(e) => {
                failed += 1;
                println!("❌ Container '{}': {e}", container.name);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} container(s) could not be removed");
    }

    Ok(())
}
