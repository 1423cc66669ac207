use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Hand `path` to the platform's default application.
///
/// The launcher is started detached and never waited on. Never fails
/// loudly: a missing path or a launcher that cannot be started is logged
/// and reported as `false`.
pub fn open_path(path: &Path) -> bool {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "cannot open missing path");
        return false;
    }

    match spawn_detached(launcher_command(path)) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, launcher = LAUNCHER, "failed to run opener");
            false
        }
    }
}

/// Start `command` without waiting for it to exit
fn spawn_detached(mut command: Command) -> io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_child| ())
}

#[cfg(target_os = "macos")]
const LAUNCHER: &str = "open";

#[cfg(target_os = "macos")]
fn launcher_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(target_os = "windows")]
const LAUNCHER: &str = "start";

#[cfg(target_os = "windows")]
fn launcher_command(path: &Path) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg("start").arg("").arg(path);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const LAUNCHER: &str = "xdg-open";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher_command(path: &Path) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}
