//! Namespace switch protocol
//!
//! Network namespace membership is per-thread kernel state. Every switch
//! therefore runs on a freshly spawned scoped thread that nobody else can
//! schedule work on: the worker records its original namespace, enters the
//! target, runs the closure and switches back before it exits. The calling
//! thread never changes namespace.

use nix::sched::{CloneFlags, setns};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::os::fd::OwnedFd;
use std::path::Path;
use std::thread;

use netweave_core::{Error, ResourceKind, Result};

/// Namespace handle of the calling thread
pub(crate) const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Run `f` inside the network namespace bound at `target`
///
/// `f` runs on a dedicated OS thread reserved for this call. Anything it
/// creates that is bound to the current namespace (netlink sockets, child
/// processes) belongs to `target`.
///
/// The worker is switched back to its original namespace on every exit
/// path. A failed switch-back is logged and never replaces the result of `f`.
///
/// # Errors
/// Returns `NotFound` if `target` does not exist, a kernel error if it
/// cannot be entered, `WorkerPanicked` if `f` panicked, or whatever `f`
/// returns.
pub fn with_namespace<T, F>(target: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    on_worker(target, || {
        enter(target)?;
        f()
    })
}

/// Run `f` on a dedicated worker that restores its network namespace on exit
///
/// `f` is free to move the worker to another namespace (`setns`, `unshare`).
pub(crate) fn on_worker<T, F>(target: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("netns-worker".to_string())
            .spawn_scoped(scope, || {
                let _restore = RestoreGuard::capture(target)?;
                f()
            })?;

        worker.join().unwrap_or_else(|_| {
            tracing::error!(namespace = %target.display(), "Namespace worker panicked");
            Err(Error::WorkerPanicked {
                target: target.display().to_string(),
            })
        })
    })
}

/// Identity of the calling thread's network namespace, e.g. `net:[4026531840]`
///
/// # Errors
/// Returns error if `/proc` is not available
pub fn current_netns_id() -> Result<String> {
    Ok(fs::read_link(THREAD_NETNS)?.to_string_lossy().into_owned())
}

/// Switch the calling thread into the namespace bound at `target`
fn enter(target: &Path) -> Result<()> {
    let handle = File::open(target).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::not_found(ResourceKind::Namespace, target.display().to_string())
        } else {
            Error::kernel("namespace open", target.display().to_string(), e)
        }
    })?;

    setns(&handle, CloneFlags::CLONE_NEWNET)
        .map_err(|e| Error::kernel("setns", target.display().to_string(), e))?;

    tracing::debug!(namespace = %target.display(), "Entered namespace");
    Ok(())
}

/// Switches the worker back to the namespace it started in
///
/// The original handle is closed when the guard drops, whatever the outcome.
struct RestoreGuard<'a> {
    original: OwnedFd,
    target: &'a Path,
}

impl<'a> RestoreGuard<'a> {
    fn capture(target: &'a Path) -> Result<Self> {
        let original = File::open(THREAD_NETNS)
            .map_err(|e| Error::kernel("namespace open", THREAD_NETNS, e))?;

        Ok(Self {
            original: original.into(),
            target,
        })
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        match setns(&self.original, CloneFlags::CLONE_NEWNET) {
            Ok(()) => {
                tracing::trace!(namespace = %self.target.display(), "Restored original namespace");
            }
            Err(e) => {
                tracing::error!(
                    namespace = %self.target.display(),
                    error = %e,
                    "Failed to restore original namespace"
                );
            }
        }
    }
}
