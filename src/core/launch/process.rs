// ─── Process Runner ───
// Spawns the built command and sends termination signals.

use std::process::Stdio;

use tracing::{debug, warn};

use super::command::LaunchCommand;

/// Spawns a [`LaunchCommand`] with piped stdout/stderr.
pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, command: &LaunchCommand) -> std::io::Result<tokio::process::Child>;
}

pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    fn spawn(&self, command: &LaunchCommand) -> std::io::Result<tokio::process::Child> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        configure_platform_spawn(&mut cmd);
        cmd.spawn()
    }
}

fn configure_platform_spawn(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NEW_CONSOLE: u32 = 0x00000010;
        cmd.creation_flags(CREATE_NEW_CONSOLE);

        // Terminal session variables make LWJGL treat the game as a console app.
        cmd.env_remove("WT_SESSION");
        cmd.env_remove("TERM");
        cmd.env_remove("ConEmuANSI");
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = cmd;
    }
}

/// Ask `pid` to exit. Returns whether the signal was delivered.
pub async fn graceful_stop(pid: u32) -> bool {
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut cmd = tokio::process::Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T"]);
        cmd
    };
    #[cfg(not(target_os = "windows"))]
    let mut cmd = {
        let mut cmd = tokio::process::Command::new("kill");
        cmd.args(["-15", &pid.to_string()]);
        cmd
    };

    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    match cmd.status().await {
        Ok(status) => {
            debug!("Termination request for pid {} returned {:?}", pid, status.code());
            status.success()
        }
        Err(e) => {
            warn!("Could not signal pid {}: {}", pid, e);
            false
        }
    }
}
