//! Application launcher for `app` shortcuts.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use super::{AppLauncher, PlatformError};

/// Launches executables as detached child processes.
///
/// The child runs with its own directory as the working directory so that
/// applications which load resources relative to their install location
/// start correctly.  On macOS an `.app` bundle is opened through `open`.
///
/// Each child is waited on by a small background thread, so an exited
/// application never lingers as a zombie.
pub struct ProcessLauncher;

impl AppLauncher for ProcessLauncher {
    fn launch(&self, path: &Path) -> Result<(), PlatformError> {
        let path = resolve_executable(path)?;

        let mut command = build_command(&path);
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| PlatformError::Launch {
            path: path.clone(),
            source,
        })?;
        info!("launched {} (pid {})", path.display(), child.id());
        reap_in_background(child);
        Ok(())
    }
}

/// Returns the absolute form of `path`.  Relative paths resolve against the
/// host's working directory, before the child's directory is changed.
fn resolve_executable(path: &Path) -> Result<PathBuf, PlatformError> {
    path.canonicalize().map_err(|_| PlatformError::AppNotFound {
        path: path.to_path_buf(),
    })
}

fn reap_in_background(mut child: Child) {
    let pid = child.id();
    let spawned = std::thread::Builder::new()
        .name(format!("localdesk-reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => debug!("launched process {pid} exited: {status}"),
            Err(e) => warn!("failed to wait for launched process {pid}: {e}"),
        });
    if let Err(e) = spawned {
        warn!("cannot watch launched process {pid}: {e}");
    }
}

#[cfg(target_os = "macos")]
fn build_command(path: &Path) -> Command {
    if path.extension().is_some_and(|ext| ext == "app") {
        let mut cmd = Command::new("open");
        cmd.arg("-a").arg(path);
        cmd
    } else {
        Command::new(path)
    }
}

#[cfg(not(target_os = "macos"))]
fn build_command(path: &Path) -> Command {
    Command::new(path)
}
