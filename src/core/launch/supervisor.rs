// ─── Process Supervisor ───
// Validates launch preconditions, spawns the game and follows it until it
// exits, crashes or is killed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::command::{required_java_major, CommandBuilder, ResolvedPaths};
use super::crash::{CrashReport, LineTail};
use super::events::{OutputStream, ProcessEvent, ProcessRecord, ProcessStatus};
use super::natives::{self, NativesExtraction};
use super::process::{graceful_stop, ProcessRunner};
use crate::core::auth::Credentials;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::JavaResolver;
use crate::core::profile::Profile;
use crate::core::store::{ArtifactStore, FileProbe};
use crate::core::version::VersionMetadata;

const EVENT_CAPACITY: usize = 1024;
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Time between the termination request and the forced kill.
    pub kill_grace: Duration,
    /// Output lines kept per stream for crash diagnosis.
    pub stderr_tail_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            kill_grace: Duration::from_millis(5000),
            stderr_tail_lines: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    /// Wipe and re-extract the natives directory even when it is complete.
    pub force_natives_extraction: bool,
}

type KillRequest = oneshot::Sender<()>;

struct RunningProcess {
    record: ProcessRecord,
    kill_tx: Option<oneshot::Sender<KillRequest>>,
}

/// A profile is `Starting` between the duplicate check and the spawn.
enum Slot {
    Starting,
    Running(RunningProcess),
}

type SlotMap = Arc<Mutex<HashMap<String, Slot>>>;

pub struct ProcessSupervisor {
    store: ArtifactStore,
    java: Arc<dyn JavaResolver>,
    probe: Arc<dyn FileProbe>,
    runner: Arc<dyn ProcessRunner>,
    builder: CommandBuilder,
    config: SupervisorConfig,
    events: broadcast::Sender<ProcessEvent>,
    slots: SlotMap,
    natives_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProcessSupervisor {
    pub fn new(
        store: ArtifactStore,
        java: Arc<dyn JavaResolver>,
        probe: Arc<dyn FileProbe>,
        runner: Arc<dyn ProcessRunner>,
        builder: CommandBuilder,
        config: SupervisorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            java,
            probe,
            runner,
            builder,
            config,
            events,
            slots: Arc::new(Mutex::new(HashMap::new())),
            natives_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self, profile_id: &str) -> bool {
        lock_slots(&self.slots).contains_key(profile_id)
    }

    pub fn list_running(&self) -> Vec<ProcessRecord> {
        lock_slots(&self.slots)
            .values()
            .filter_map(|slot| match slot {
                Slot::Running(process) => Some(process.record.clone()),
                Slot::Starting => None,
            })
            .collect()
    }

    pub async fn launch_game(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
        credentials: Option<&Credentials>,
    ) -> LauncherResult<ProcessRecord> {
        self.launch_game_with(profile, metadata, credentials, LaunchOptions::default())
            .await
    }

    /// Launch `profile` from its vanilla version document.
    ///
    /// Identity, credentials and the one-process-per-profile rule are checked
    /// before anything touches the disk.
    pub async fn launch_game_with(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
        credentials: Option<&Credentials>,
        options: LaunchOptions,
    ) -> LauncherResult<ProcessRecord> {
        let violations = profile.identity_violations();
        if !violations.is_empty() {
            return Err(LauncherError::validation(violations));
        }
        let credentials = credentials.ok_or(LauncherError::CredentialsMissing)?;
        credentials.ensure_valid()?;

        self.reserve(&profile.id)?;
        match self.start(profile, metadata, credentials, options).await {
            Ok(record) => Ok(record),
            Err(e) => {
                lock_slots(&self.slots).remove(&profile.id);
                warn!("Launch of profile {} failed: {}", profile.id, e);
                Err(e)
            }
        }
    }

    fn reserve(&self, profile_id: &str) -> LauncherResult<()> {
        let mut slots = lock_slots(&self.slots);
        if slots.contains_key(profile_id) {
            return Err(LauncherError::AlreadyRunning(profile_id.to_string()));
        }
        slots.insert(profile_id.to_string(), Slot::Starting);
        Ok(())
    }

    async fn start(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
        credentials: &Credentials,
        options: LaunchOptions,
    ) -> LauncherResult<ProcessRecord> {
        let client_jar = self.store.version_jar_path(&profile.version_id);
        if !self.probe.exists(&client_jar) {
            return Err(LauncherError::validation(vec![format!(
                "Client jar is missing: {}",
                client_jar.display()
            )]));
        }

        let metadata = self.effective_metadata(profile, metadata).await?;
        let java = match &profile.java_path {
            Some(path) => path.clone(),
            None => {
                resolve_java(
                    Arc::clone(&self.java),
                    required_java_major(profile, &metadata),
                )
                .await?
            }
        };
        let paths = ResolvedPaths::for_profile(&self.store, profile, java);

        self.ensure_natives_extracted(&metadata, &paths.natives_dir, options.force_natives_extraction)
            .await?;

        let command = self.builder.build(profile, &metadata, credentials, &paths)?;
        info!(
            "Launching profile '{}' ({}) with Java {:?}",
            profile.name,
            profile.launch_version_id(),
            command.executable
        );
        debug!("Command (copy/paste): {}", command.display_for_logs());

        let mut child = self
            .runner
            .spawn(&command)
            .map_err(|e| LauncherError::ProcessSpawn {
                program: command.executable.clone(),
                source: e,
            })?;
        let Some(pid) = child.id() else {
            return Err(LauncherError::Other(format!(
                "Game process for profile {} exited before it could be tracked",
                profile.id
            )));
        };

        let record = ProcessRecord {
            pid,
            profile_id: profile.id.clone(),
            started_at: Utc::now(),
            status: ProcessStatus::Running,
        };
        let (kill_tx, kill_rx) = oneshot::channel();
        lock_slots(&self.slots).insert(
            profile.id.clone(),
            Slot::Running(RunningProcess {
                record: record.clone(),
                kill_tx: Some(kill_tx),
            }),
        );

        let _ = self.events.send(ProcessEvent::Started {
            pid,
            profile_id: profile.id.clone(),
        });
        info!("Game process for profile {} started (pid {})", profile.id, pid);

        let tail = self.config.stderr_tail_lines;
        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(pump_lines(
                out,
                OutputStream::Stdout,
                pid,
                profile.id.clone(),
                self.events.clone(),
                tail,
            ))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(pump_lines(
                err,
                OutputStream::Stderr,
                pid,
                profile.id.clone(),
                self.events.clone(),
                tail,
            ))
        });

        tokio::spawn(monitor(Monitor {
            child,
            pid,
            profile_id: profile.id.clone(),
            kill_rx,
            stdout,
            stderr,
            slots: Arc::clone(&self.slots),
            events: self.events.clone(),
            kill_grace: self.config.kill_grace,
        }));

        Ok(record)
    }

    /// Fold the installed loader document onto the vanilla one when the
    /// profile runs a mod loader.
    async fn effective_metadata(
        &self,
        profile: &Profile,
        metadata: &VersionMetadata,
    ) -> LauncherResult<VersionMetadata> {
        let launch_id = profile.launch_version_id();
        if profile.mod_loader.is_none() || metadata.id == launch_id {
            return Ok(metadata.clone());
        }

        let loader_json = self.store.version_json_path(&launch_id);
        if !self.probe.exists(&loader_json) {
            return Err(LauncherError::validation(vec![format!(
                "Mod loader version {} is not installed",
                launch_id
            )]));
        }
        let loader_doc = VersionMetadata::load(&loader_json).await?;
        Ok(loader_doc.merged_onto(metadata))
    }

    /// Extract natives for one version directory, one extraction at a time.
    pub async fn ensure_natives_extracted(
        &self,
        metadata: &VersionMetadata,
        natives_dir: &Path,
        force: bool,
    ) -> LauncherResult<NativesExtraction> {
        let lock = {
            let mut locks = self
                .natives_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(natives_dir.to_path_buf()).or_default())
        };
        let result = {
            let _guard = lock.lock().await;
            natives::ensure_natives_extracted(
                metadata,
                &self.store,
                natives_dir,
                self.builder.rules(),
                force,
            )
            .await
        };

        let mut locks = self
            .natives_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map and this call hold it: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(natives_dir);
        }
        result
    }

    /// Terminate the process with `pid`. Resolves once the process is gone
    /// and its `Killed` event has been emitted.
    pub async fn kill_game_process(&self, pid: u32) -> bool {
        let kill_tx = lock_slots(&self.slots).values_mut().find_map(|slot| match slot {
            Slot::Running(process) if process.record.pid == pid => process.kill_tx.take(),
            _ => None,
        });
        let Some(kill_tx) = kill_tx else {
            debug!("No tracked game process with pid {}", pid);
            return false;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if kill_tx.send(ack_tx).is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }

    /// Kill every tracked process. Individual failures are logged only.
    pub async fn cleanup(&self) -> usize {
        let pids: Vec<u32> = self.list_running().iter().map(|r| r.pid).collect();
        if pids.is_empty() {
            return 0;
        }
        info!("Terminating {} running game processes", pids.len());

        let results = join_all(pids.iter().map(|pid| self.kill_game_process(*pid))).await;
        let killed = results.iter().filter(|ok| **ok).count();
        if killed < pids.len() {
            warn!("{} game processes could not be terminated", pids.len() - killed);
        }
        killed
    }
}

/// Java discovery walks install roots and runs `java -version`.
async fn resolve_java(resolver: Arc<dyn JavaResolver>, major: u32) -> LauncherResult<PathBuf> {
    tokio::task::spawn_blocking(move || resolver.resolve(major))
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))?
        .ok_or(LauncherError::JavaNotFound(major))
}

fn lock_slots(slots: &SlotMap) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─── Output ───

async fn pump_lines<R>(
    reader: R,
    stream: OutputStream,
    pid: u32,
    profile_id: String,
    events: broadcast::Sender<ProcessEvent>,
    tail_lines: usize,
) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = LineTail::new(tail_lines);
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match stream {
                    OutputStream::Stdout => info!("[mc:{}][stdout] {}", profile_id, line),
                    OutputStream::Stderr => warn!("[mc:{}][stderr] {}", profile_id, line),
                }
                tail.push(line.clone());
                let _ = events.send(ProcessEvent::for_line(pid, &profile_id, stream, line));
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Output stream of pid {} closed: {}", pid, e);
                break;
            }
        }
    }
    tail.into_lines()
}

async fn drain(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    let Some(mut handle) = handle else {
        return Vec::new();
    };
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            warn!("Output reader failed: {}", e);
            Vec::new()
        }
        Err(_) => {
            // A grandchild still holds the pipe open.
            handle.abort();
            Vec::new()
        }
    }
}

// ─── Lifecycle ───

struct Monitor {
    child: Child,
    pid: u32,
    profile_id: String,
    kill_rx: oneshot::Receiver<KillRequest>,
    stdout: Option<JoinHandle<Vec<String>>>,
    stderr: Option<JoinHandle<Vec<String>>>,
    slots: SlotMap,
    events: broadcast::Sender<ProcessEvent>,
    kill_grace: Duration,
}

enum Stop {
    Exited(std::io::Result<std::process::ExitStatus>),
    Kill(KillRequest),
}

async fn monitor(mut m: Monitor) {
    let stop = tokio::select! {
        status = m.child.wait() => Stop::Exited(status),
        request = &mut m.kill_rx => match request {
            Ok(ack) => Stop::Kill(ack),
            Err(_) => Stop::Exited(m.child.wait().await),
        },
    };

    let killed = matches!(stop, Stop::Kill(_));
    if killed {
        terminate(&mut m.child, m.pid, m.kill_grace).await;
    }
    let stdout_tail = drain(m.stdout.take()).await;
    let stderr_tail = drain(m.stderr.take()).await;

    let (event, ack) = match stop {
        Stop::Kill(ack) => {
            info!("Game process {} for profile {} killed", m.pid, m.profile_id);
            let event = ProcessEvent::Killed {
                pid: m.pid,
                profile_id: m.profile_id.clone(),
            };
            (event, Some(ack))
        }
        Stop::Exited(status) => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    error!("Waiting on pid {} failed: {}", m.pid, e);
                    None
                }
            };

            let event = if code == Some(0) {
                info!("Game process {} for profile {} exited cleanly", m.pid, m.profile_id);
                ProcessEvent::Exited {
                    pid: m.pid,
                    profile_id: m.profile_id.clone(),
                    exit_code: 0,
                }
            } else {
                let report =
                    CrashReport::analyze(m.pid, &m.profile_id, code, stderr_tail, &stdout_tail);
                error!(
                    "Game process {} for profile {} crashed (code {:?}, causes {:?})",
                    m.pid, m.profile_id, code, report.causes
                );
                ProcessEvent::Crashed { report }
            };
            (event, None)
        }
    };

    lock_slots(&m.slots).remove(&m.profile_id);
    let _ = m.events.send(event);
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

async fn terminate(child: &mut Child, pid: u32, grace: Duration) {
    graceful_stop(pid).await;
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!("pid {} stopped with {:?}", pid, status.code()),
        Ok(Err(e)) => warn!("Waiting on pid {} failed: {}", pid, e),
        Err(_) => {
            warn!("pid {} ignored the termination request, forcing", pid);
            if let Err(e) = child.kill().await {
                warn!("Force kill of pid {} failed: {}", pid, e);
            }
        }
    }
}
