//! Process execution inside named namespaces
//!
//! One-shot commands are spawned from a switched worker thread, so the child
//! simply inherits the namespace.
//!
//! Interactive attach needs a new session, a controlling terminal and its own
//! UTS namespace, so it takes two hops: the parent re-executes the current
//! binary with the hidden [`NSENTER_COMMAND`] and an authorization variable,
//! and that child enters the namespace and replaces itself with the shell
//! (see [`enter_and_exec_shell`]).

use nix::sched::{CloneFlags, setns, unshare};
use nix::unistd::{execve, sethostname, setsid};
use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::fs::File;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, ExitStatus};

use netweave_core::{Error, NetConfig, ResourceKind, Result};

use crate::with_namespace;

/// Hidden subcommand the attach child is started with
pub const NSENTER_COMMAND: &str = "__netweave_nsenter";

/// Environment variable authorizing the attach child to enter a namespace
pub const ATTACH_AUTH_ENV: &str = "NETWEAVE_CHILD_AUTH";

/// Run `argv` inside the namespace at `path` with inherited standard streams
pub(crate) fn exec_in(path: &Path, argv: &[String]) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::invalid("Command cannot be empty"))?;

    tracing::debug!(
        namespace = %path.display(),
        command = %argv.join(" "),
        "Executing command in namespace"
    );

    let status = with_namespace(path, || {
        Command::new(program)
            .args(args)
            .status()
            .map_err(|e| Error::kernel("exec", program.as_str(), e))
    })?;

    tracing::debug!(namespace = %path.display(), status = %status, "Command exited");
    Ok(status)
}

/// Start the authorized attach child and wait for the shell to exit
pub(crate) fn spawn_attach(config: &NetConfig, path: &Path, name: &str) -> Result<ExitStatus> {
    if !path.exists() {
        return Err(Error::not_found(
            ResourceKind::Namespace,
            path.display().to_string(),
        ));
    }

    tracing::info!(namespace = %path.display(), hostname = %name, "Attaching shell");

    attach_command(Path::new("/proc/self/exe"), config, path, name)
        .status()
        .map_err(|e| Error::kernel("attach", path.display().to_string(), e))
}

/// Command for the attach child: `program` re-run in a new session and UTS namespace
///
/// When stdin is a terminal the child takes it over as its controlling
/// terminal, even if it still belongs to the caller's session.
fn attach_command(program: &Path, config: &NetConfig, path: &Path, name: &str) -> Command {
    let mut command = Command::new(program);
    command
        .arg(NSENTER_COMMAND)
        .arg(path)
        .arg(name)
        .env(ATTACH_AUTH_ENV, "1")
        .env("NETWEAVE_SHELL", &config.shell);

    // SAFETY: only async-signal-safe syscalls between fork and exec
    unsafe {
        command.pre_exec(|| {
            setsid()?;
            if libc::isatty(0) == 1 && libc::ioctl(0, libc::TIOCSCTTY, 1) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            unshare(CloneFlags::CLONE_NEWUTS)?;
            Ok(())
        });
    }

    command
}

/// Child half of attach: enter `path`, set the hostname and exec the shell
///
/// Refuses to do anything unless the process was started by attach, i.e.
/// [`ATTACH_AUTH_ENV`] is set to `1`. The variable is not passed on to the
/// shell.
///
/// # Errors
/// Returns error if unauthorized or if any step before the exec fails. On
/// success this function does not return.
pub fn enter_and_exec_shell(path: &Path, hostname: &str, config: &NetConfig) -> Result<Infallible> {
    if std::env::var_os(ATTACH_AUTH_ENV).is_none_or(|v| v != "1") {
        return Err(Error::invalid(format!(
            "{NSENTER_COMMAND} may only be started by attach"
        )));
    }

    let handle = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::not_found(ResourceKind::Namespace, path.display().to_string())
        } else {
            Error::kernel("namespace open", path.display().to_string(), e)
        }
    })?;
    setns(&handle, CloneFlags::CLONE_NEWNET)
        .map_err(|e| Error::kernel("setns", path.display().to_string(), e))?;
    drop(handle);

    sethostname(hostname).map_err(|e| Error::kernel("sethostname", hostname, e))?;

    let shell = cstring(config.shell.clone().into_os_string())?;
    let args = [
        shell.clone(),
        cstring("--noprofile".into())?,
        cstring("--norc".into())?,
    ];
    let env = shell_environment(&config.prompt_for(hostname))?;

    tracing::debug!(shell = %config.shell.display(), hostname, "Executing shell");

    execve(&shell, &args, &env)
        .map_err(|e| Error::kernel("exec", config.shell.display().to_string(), e))
}

/// Current environment minus the attach credential, with `PS1` set to `prompt`
fn shell_environment(prompt: &str) -> Result<Vec<CString>> {
    let mut env = Vec::new();

    for (key, value) in std::env::vars_os() {
        if key == ATTACH_AUTH_ENV || key == "PS1" {
            continue;
        }
        let mut entry = key;
        entry.push("=");
        entry.push(value);
        env.push(cstring(entry)?);
    }

    env.push(cstring(format!("PS1={prompt}").into())?);
    Ok(env)
}

fn cstring(value: OsString) -> Result<CString> {
    CString::new(value.into_vec()).map_err(|e| Error::invalid(format!("Invalid argument: {e}")))
}
