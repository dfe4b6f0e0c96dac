// In-memory doubles for the network, filesystem-probe and process seams.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{Notify, Semaphore};

use crate::core::downloader::source::{RemoteBody, RemoteSource};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::command::LaunchCommand;
use crate::core::launch::process::ProcessRunner;
use crate::core::store::FileProbe;

/// Fresh scratch directory for one test.
pub fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "launcher-core-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&root);
    root
}

/// Parks every fetch of one URL at its start until released.
pub struct FetchGate {
    entered: Notify,
    open: Semaphore,
}

impl FetchGate {
    /// Resolves once a fetch is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked fetch continue.
    pub fn release(&self) {
        self.open.add_permits(1);
    }
}

#[derive(Default)]
struct SourceState {
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    offline: bool,
    corrupt_remaining: HashMap<String, usize>,
    calls: HashMap<String, usize>,
    offsets: HashMap<String, Vec<u64>>,
    gates: HashMap<String, Arc<FetchGate>>,
}

/// Scriptable [`RemoteSource`] that records every request.
#[derive(Default)]
pub struct MemorySource {
    state: Mutex<SourceState>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, url: &str, body: Vec<u8>) -> Self {
        self.lock().files.insert(url.to_string(), body);
        self
    }

    pub fn with_text(self, url: &str, body: impl Into<String>) -> Self {
        self.lock()
            .files
            .insert(url.to_string(), body.into().into_bytes());
        self
    }

    /// Serve a flipped first byte for the next `times` fetches of `url`.
    pub fn corrupt_first(self, url: &str, times: usize) -> Self {
        self.lock().corrupt_remaining.insert(url.to_string(), times);
        self
    }

    pub fn failing(self, url: &str) -> Self {
        self.lock().failing.insert(url.to_string());
        self
    }

    pub fn gate(&self, url: &str) -> Arc<FetchGate> {
        let gate = Arc::new(FetchGate {
            entered: Notify::new(),
            open: Semaphore::new(0),
        });
        self.lock().gates.insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn calls(&self, url: &str) -> usize {
        self.lock().calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn offsets(&self, url: &str) -> Vec<u64> {
        self.lock().offsets.get(url).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SourceState> {
        self.state.lock().unwrap()
    }

    fn record(&self, url: &str) -> LauncherResult<()> {
        let mut state = self.lock();
        *state.calls.entry(url.to_string()).or_default() += 1;
        if state.offline || state.failing.contains(url) {
            return Err(LauncherError::Network(format!("unreachable: {url}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        self.record(url)?;
        let state = self.lock();
        match state.files.get(url) {
            Some(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            None => Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn fetch_from(&self, url: &str, offset: u64) -> LauncherResult<RemoteBody> {
        self.record(url)?;
        let gate = self.lock().gates.get(url).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.open.acquire().await {
                permit.forget();
            }
        }
        let mut state = self.lock();
        state
            .offsets
            .entry(url.to_string())
            .or_default()
            .push(offset);

        let mut body = match state.files.get(url) {
            Some(bytes) => bytes.clone(),
            None => {
                return Err(LauncherError::DownloadFailed {
                    url: url.to_string(),
                    status: 404,
                })
            }
        };

        if let Some(remaining) = state.corrupt_remaining.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                if let Some(first) = body.first_mut() {
                    *first ^= 0xff;
                }
            }
        }

        let resumed = offset > 0 && (offset as usize) < body.len();
        let slice = if resumed {
            body.split_off(offset as usize)
        } else {
            body
        };
        let content_length = Some(slice.len() as u64);
        let chunks: Vec<LauncherResult<Vec<u8>>> =
            slice.chunks(1024).map(|c| Ok(c.to_vec())).collect();

        Ok(RemoteBody {
            resumed,
            content_length,
            chunks: stream::iter(chunks).boxed(),
        })
    }
}

/// [`FileProbe`] over a fixed set of paths that counts every query.
#[derive(Default)]
pub struct CountingProbe {
    present: Mutex<HashSet<PathBuf>>,
    calls: AtomicUsize,
    all_present: bool,
}

impl CountingProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `true` for every path.
    pub fn everything_present() -> Self {
        Self {
            all_present: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.present.lock().unwrap().insert(path.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FileProbe for CountingProbe {
    fn exists(&self, path: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.all_present || self.present.lock().unwrap().contains(path)
    }
}

/// Runs a shell script instead of the real command and counts spawns.
#[cfg(unix)]
pub struct ScriptRunner {
    script: String,
    spawns: AtomicUsize,
    last_command: Mutex<Option<LaunchCommand>>,
}

#[cfg(unix)]
impl ScriptRunner {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            spawns: AtomicUsize::new(0),
            last_command: Mutex::new(None),
        }
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Option<LaunchCommand> {
        self.last_command.lock().unwrap().clone()
    }
}

#[cfg(unix)]
impl ProcessRunner for ScriptRunner {
    fn spawn(&self, command: &LaunchCommand) -> std::io::Result<tokio::process::Child> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        *self.last_command.lock().unwrap() = Some(command.clone());
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.script)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
    }
}
