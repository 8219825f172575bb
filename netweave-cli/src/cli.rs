//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "netweave")]
#[command(about = "Virtual network fabric built from namespaces, veths and bridges", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List containers
    #[command(name = "ls", alias = "list")]
    List,

    /// Delete containers and everything they own
    #[command(name = "rm", alias = "remove")]
    Remove {
        /// Container names or ID prefixes
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Open an interactive shell inside a container
    Attach {
        /// Container name or ID prefix
        container: String,
    },

    /// Run a command inside a container
    Exec {
        /// Container name or ID prefix
        container: String,

        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Build a topology (two hosts behind one switch if no file is given)
    Build {
        /// Topology JSON file
        file: Option<PathBuf>,

        /// Only validate the topology
        #[arg(long)]
        check: bool,
    },

    /// Delete every container
    Cleanup,

    /// Show a container and its interfaces
    Inspect {
        /// Container name or ID prefix
        container: String,
    },

    /// Attach child entry point
    #[command(name = "__netweave_nsenter", hide = true)]
    Nsenter {
        /// Namespace path
        path: PathBuf,

        /// Container name, used as hostname
        name: String,
    },
}
