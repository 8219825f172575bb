//! Named namespace lifecycle
//!
//! A named namespace is a bind mount of a namespace handle onto a file under
//! the configured netns directory, the same layout `ip netns` uses. The
//! mount keeps the namespace alive after the creating thread is gone.

use nix::errno::Errno;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::sched::{CloneFlags, unshare};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::process::ExitStatus;

use netweave_core::{Error, NamespaceOps, NetConfig, Namespace, ResourceKind, ResourceName, Result};

use crate::executor;
use crate::switch::{THREAD_NETNS, on_worker};

/// Kernel-backed [`NamespaceOps`]
#[derive(Debug, Clone)]
pub struct NetnsManager {
    config: NetConfig,
}

impl NetnsManager {
    /// Create a new namespace manager
    #[must_use]
    pub const fn new(config: NetConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Bind a fresh network namespace onto the mount point `path`
    fn bind_new(path: &Path) -> Result<()> {
        on_worker(path, || {
            unshare(CloneFlags::CLONE_NEWNET)
                .map_err(|e| Error::kernel("unshare", path.display().to_string(), e))?;

            mount(
                Some(THREAD_NETNS),
                path,
                None::<&str>,
                MsFlags::MS_BIND,
                None::<&str>,
            )
            .map_err(|e| Error::kernel("namespace bind", path.display().to_string(), e))?;

            Ok(())
        })
    }
}

impl NamespaceOps for NetnsManager {
    fn create(&self, name: &ResourceName) -> Result<Namespace> {
        let path = self.config.netns_path(name.as_str());

        fs::create_dir_all(&self.config.netns_dir)?;

        // The mount point doubles as the lock on the name
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    Error::already_exists(ResourceKind::Namespace, name.as_str())
                } else {
                    Error::kernel("namespace create", path.display().to_string(), e)
                }
            })?;

        if let Err(e) = Self::bind_new(&path) {
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!(
                    namespace = %path.display(),
                    error = %cleanup,
                    "Failed to remove mount point after failed create"
                );
            }
            return Err(e);
        }

        tracing::info!(namespace = %name, path = %path.display(), "Namespace created");

        Ok(Namespace::new(name.clone(), path))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::not_found(
                ResourceKind::Namespace,
                path.display().to_string(),
            ));
        }

        match umount2(path, MntFlags::MNT_DETACH) {
            Ok(()) => {}
            // Not a mount point: a stale file left behind by a crashed create
            Err(Errno::EINVAL) => {
                tracing::debug!(namespace = %path.display(), "Namespace was not mounted");
            }
            Err(e) => {
                return Err(Error::kernel(
                    "namespace unmount",
                    path.display().to_string(),
                    e,
                ));
            }
        }

        fs::remove_file(path)
            .map_err(|e| Error::kernel("namespace remove", path.display().to_string(), e))?;

        tracing::info!(namespace = %path.display(), "Namespace deleted");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn exec(&self, path: &Path, argv: &[String]) -> Result<ExitStatus> {
        executor::exec_in(path, argv)
    }

    fn attach(&self, path: &Path, name: &str) -> Result<ExitStatus> {
        executor::spawn_attach(&self.config, path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_delete_unknown_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = NetnsManager::new(NetConfig::new().with_netns_dir(dir.path()));

        let err = manager.delete(&dir.path().join("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_refuses_existing_mount_point() {
        let dir = TempDir::new().unwrap();
        let manager = NetnsManager::new(NetConfig::new().with_netns_dir(dir.path()));
        fs::write(dir.path().join("h1"), b"").unwrap();

        let err = manager
            .create(&ResourceName::new("h1").unwrap())
            .unwrap_err();

        assert!(err.is_already_exists());
        assert!(dir.path().join("h1").exists());
    }

    #[test]
    fn test_delete_removes_stale_mount_point() {
        let dir = TempDir::new().unwrap();
        let manager = NetnsManager::new(NetConfig::new().with_netns_dir(dir.path()));
        let stale = dir.path().join("stale");
        fs::write(&stale, b"").unwrap();

        // umount2 on a plain file fails with EINVAL (or EPERM unprivileged)
        match manager.delete(&stale) {
            Ok(()) => assert!(!stale.exists()),
            Err(e) => assert!(matches!(e, Error::KernelOperation { .. })),
        }
    }
}
