use chrono::{DateTime, Utc};
use serde::Serialize;

use super::crash::CrashReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Running,
    Exited,
    Crashed,
    Killed,
}

/// Handle for a spawned game process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: u32,
    pub profile_id: String,
    pub started_at: DateTime<Utc>,
    pub status: ProcessStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Lifecycle and output notifications of supervised processes.
///
/// For one pid, `Started` always comes first and exactly one of
/// `Exited`, `Crashed` or `Killed` comes last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessEvent {
    Started {
        pid: u32,
        profile_id: String,
    },
    Output {
        pid: u32,
        profile_id: String,
        line: String,
    },
    Warning {
        pid: u32,
        profile_id: String,
        line: String,
    },
    Error {
        pid: u32,
        profile_id: String,
        line: String,
    },
    Exited {
        pid: u32,
        profile_id: String,
        exit_code: i32,
    },
    Crashed {
        report: CrashReport,
    },
    Killed {
        pid: u32,
        profile_id: String,
    },
}

impl ProcessEvent {
    pub fn pid(&self) -> u32 {
        match self {
            ProcessEvent::Started { pid, .. }
            | ProcessEvent::Output { pid, .. }
            | ProcessEvent::Warning { pid, .. }
            | ProcessEvent::Error { pid, .. }
            | ProcessEvent::Exited { pid, .. }
            | ProcessEvent::Killed { pid, .. } => *pid,
            ProcessEvent::Crashed { report } => report.pid,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessEvent::Exited { .. } | ProcessEvent::Crashed { .. } | ProcessEvent::Killed { .. }
        )
    }

    /// Output notification for one line, leveled by the log markers the
    /// game and its loaders print.
    pub fn for_line(pid: u32, profile_id: &str, stream: OutputStream, line: String) -> Self {
        let profile_id = profile_id.to_string();
        if is_error_line(&line) {
            return ProcessEvent::Error {
                pid,
                profile_id,
                line,
            };
        }
        match stream {
            OutputStream::Stderr => ProcessEvent::Warning {
                pid,
                profile_id,
                line,
            },
            OutputStream::Stdout if line.contains("/WARN]") || line.contains("[WARN]") => {
                ProcessEvent::Warning {
                    pid,
                    profile_id,
                    line,
                }
            }
            OutputStream::Stdout => ProcessEvent::Output {
                pid,
                profile_id,
                line,
            },
        }
    }
}

fn is_error_line(line: &str) -> bool {
    ["/ERROR]", "/FATAL]", "[ERROR]", "Exception in thread", "Caused by:"]
        .iter()
        .any(|marker| line.contains(marker))
}
