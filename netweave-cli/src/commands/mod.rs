use anyhow::{Result, bail};
use netweave_core::NetConfig;
use netweave_fabric::{Container, ContainerManager, DeleteReport};

use crate::cli::Commands;

pub mod attach;
pub mod build;
pub mod cleanup;
pub mod exec;
pub mod inspect;
pub mod list;
pub mod nsenter;
pub mod remove;

/// Dispatch command to appropriate handler, returning the exit code
pub fn dispatch(command: Commands, config: NetConfig) -> Result<i32> {
    match command {
        Commands::List => list::execute(&ContainerManager::system(config)).map(|()| 0),

        Commands::Remove { containers } => {
            remove::execute(&ContainerManager::system(config), &containers).map(|()| 0)
        }

        Commands::Attach { container } => {
            attach::execute(&ContainerManager::system(config), &container)
        }

        Commands::Exec { container, command } => {
            exec::execute(&ContainerManager::system(config), &container, &command)
        }

        Commands::Build { file, check } => {
            build::execute(&ContainerManager::system(config), file.as_deref(), check).map(|()| 0)
        }

        Commands::Cleanup => cleanup::execute(&ContainerManager::system(config)).map(|()| 0),

        Commands::Inspect { container } => {
            inspect::execute(&ContainerManager::system(config), &container).map(|()| 0)
        }

        Commands::Nsenter { path, name } => nsenter::execute(&config, &path, &name),
    }
}

/// Fail unless running with root privileges
pub fn require_root(command: &str) -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        bail!("Must run as root. Try: sudo netweave {command} ...");
    }
    Ok(())
}

/// Print the outcome of a container delete
pub fn print_report(container: &Container, report: &DeleteReport) {
    if report.is_clean() {
        println!("✅ Container '{}' removed", container.name);
    } else {
        println!(
            "⚠️  Container '{}' removed with {} warning(s)",
            container.name,
            report.warnings.len()
        );
        for warning in &report.warnings {
            println!("   - {warning}");
        }
    }
}

/// Exit code a shell would report for `status`
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
