//! Lifecycle wrapper around one spawned external process.
//!
//! A [`ProcessHandle`] moves `NotStarted → Running → Stopping → Exited` and
//! never restarts. Once started, the child is owned by a supervisor task that
//! waits for whichever comes first:
//!
//! - the process exits on its own,
//! - the bound [`Scope`] is cancelled (or its deadline passes),
//! - [`ProcessHandle::stop`] is called, or the handle is dropped.
//!
//! Every path except a natural exit sends an interrupt (SIGINT on unix, so
//! ffmpeg finalizes its output) and gives the process a grace period to exit
//! before killing it.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ks_core::config::{ProcessConfig, StdioMode};
use ks_core::{Error, Result, Scope};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::command::ToolCommand;
use crate::progress::{Progress, ProgressParser, ProgressSender};

/// Default time allowed between the interrupt and a forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How long to keep draining progress output after the process has exited.
const PROGRESS_DRAIN: Duration = Duration::from_millis(500);

/// Observable lifecycle state of a [`ProcessHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopping,
    Exited,
}

/// Why a process exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The process finished by itself.
    Natural,
    /// [`ProcessHandle::stop`] was called or the handle was dropped.
    Stopped,
    /// The bound scope was cancelled or its deadline passed.
    Cancelled,
}

/// Outcome of a process run.
#[derive(Debug, Clone)]
pub struct ExitReport {
    /// Exit status, if the OS reported one.
    pub status: Option<ExitStatus>,
    pub reason: ExitReason,
    /// Whether the process ignored the interrupt and had to be killed.
    pub escalated: bool,
    /// Time between spawn and exit.
    pub elapsed: Duration,
}

impl ExitReport {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }
}

struct ProgressHook {
    sender: Arc<ProgressSender>,
    total: Option<Duration>,
    stage: String,
}

/// Handle owning one external process.
pub struct ProcessHandle {
    command: ToolCommand,
    grace_period: Duration,
    progress: Option<ProgressHook>,
    state: ProcessState,
    pid: Option<u32>,
    scope: Option<Scope>,
    stop_tx: Option<oneshot::Sender<()>>,
    supervisor: Option<JoinHandle<Result<ExitReport>>>,
    reader: Option<JoinHandle<()>>,
    report: Option<ExitReport>,
    latest: Arc<Mutex<Option<Progress>>>,
}

impl ProcessHandle {
    /// Create a handle for `command` with the default grace period.
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            grace_period: DEFAULT_GRACE_PERIOD,
            progress: None,
            state: ProcessState::NotStarted,
            pid: None,
            scope: None,
            stop_tx: None,
            supervisor: None,
            reader: None,
            report: None,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a handle using the grace period and stdio mode from `config`.
    pub fn from_config(mut command: ToolCommand, config: &ProcessConfig) -> Self {
        command.stdio(config.stdio);
        Self::new(command).with_grace_period(config.grace_period)
    }

    /// Builder: set the time allowed between interrupt and forced kill.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Builder: parse ffmpeg `-progress` output from stderr and forward it.
    ///
    /// The command must carry [`crate::progress::PROGRESS_FLAGS`]. `total` is
    /// the expected output duration used to compute percentages.
    pub fn with_progress(
        mut self,
        sender: ProgressSender,
        total: Option<Duration>,
        stage: impl Into<String>,
    ) -> Self {
        self.progress = Some(ProgressHook {
            sender: Arc::new(sender),
            total,
            stage: stage.into(),
        });
        self
    }

    /// The command this handle launches.
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// OS process id while running.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The exit report, once the exit has been observed.
    pub fn report(&self) -> Option<&ExitReport> {
        self.report.as_ref()
    }

    /// Most recent progress snapshot, if progress parsing is enabled.
    pub fn latest_progress(&self) -> Option<Progress> {
        self.latest.lock().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        match self.state {
            ProcessState::Running | ProcessState::Stopping => {
                if self.supervisor.as_ref().is_some_and(|h| h.is_finished()) {
                    ProcessState::Exited
                } else if self.stop_tx.is_none()
                    || self.scope.as_ref().is_some_and(|s| s.is_cancelled())
                {
                    ProcessState::Stopping
                } else {
                    ProcessState::Running
                }
            }
            other => other,
        }
    }

    /// Spawn the process and bind its lifetime to `scope`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] on any call after a successful start.
    /// - [`Error::Cancelled`] if `scope` is already cancelled.
    /// - [`Error::Spawn`] if the OS cannot create the process.
    pub fn start(&mut self, scope: &Scope) -> Result<()> {
        let tool = self.command.program_name();
        if self.state != ProcessState::NotStarted {
            return Err(Error::AlreadyStarted(format!("{tool} process")));
        }
        scope.check(&tool)?;

        let mut cmd = Command::new(self.command.program());
        cmd.args(self.command.get_args())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match self.command.stdio_mode() {
            StdioMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            StdioMode::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }
        if self.progress.is_some() {
            cmd.stderr(Stdio::piped());
        }

        tracing::debug!(
            "Spawning {}: {}",
            self.command.program().display(),
            self.command.get_args().join(" ")
        );
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(tool.clone(), e.to_string()))?;

        self.pid = child.id();
        tracing::info!("Started {tool} (pid {:?})", self.pid);

        if let (Some(hook), Some(stderr)) = (self.progress.as_ref(), child.stderr.take()) {
            let parser = ProgressParser::new(hook.total).with_stage(hook.stage.clone());
            self.reader = Some(tokio::spawn(read_progress(
                stderr,
                parser,
                hook.sender.clone(),
                self.latest.clone(),
            )));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);
        self.scope = Some(scope.clone());
        self.supervisor = Some(tokio::spawn(supervise(
            child,
            scope.clone(),
            stop_rx,
            self.grace_period,
            tool,
        )));
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Interrupt the process and wait for it to exit, killing it if it is
    /// still alive after the grace period.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] if the process was never started, if its exit
    /// was already observed, or if it had already exited on its own.
    pub async fn stop(&mut self) -> Result<ExitReport> {
        let tool = self.command.program_name();
        match self.state {
            ProcessState::NotStarted => {
                return Err(Error::NotRunning(format!("{tool} was never started")));
            }
            ProcessState::Exited => {
                return Err(Error::NotRunning(format!("{tool} already exited")));
            }
            ProcessState::Running | ProcessState::Stopping => {}
        }

        let finished = self.supervisor.as_ref().is_some_and(|h| h.is_finished());
        if finished {
            let report = self.collect().await?;
            if report.reason == ExitReason::Natural {
                return Err(Error::NotRunning(format!(
                    "{tool} already exited ({})",
                    describe_status(report.status)
                )));
            }
            return Ok(report);
        }

        self.state = ProcessState::Stopping;
        if let Some(tx) = self.stop_tx.take() {
            // The supervisor may have just finished; either way collect()
            // observes the outcome.
            let _ = tx.send(());
        }
        self.collect().await
    }

    /// Wait until the process exits, naturally or through the stop path.
    ///
    /// Returns the stored report if the exit was already observed.
    pub async fn wait(&mut self) -> Result<ExitReport> {
        match self.state {
            ProcessState::NotStarted => Err(Error::NotRunning(format!(
                "{} was never started",
                self.command.program_name()
            ))),
            ProcessState::Exited => self.report.clone().ok_or_else(|| {
                Error::NotRunning(format!("{} already exited", self.command.program_name()))
            }),
            ProcessState::Running | ProcessState::Stopping => self.collect().await,
        }
    }

    /// Start the process and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Everything [`start`](Self::start) returns, plus [`Error::Tool`] on a
    /// non-zero exit and [`Error::Cancelled`] when `scope` ended the run.
    pub async fn run(&mut self, scope: &Scope) -> Result<ExitReport> {
        self.start(scope)?;
        let report = self.wait().await?;
        let tool = self.command.program_name();
        match report.reason {
            ExitReason::Natural if report.success() => Ok(report),
            ExitReason::Natural => Err(Error::tool(
                tool,
                format!("exited with {}", describe_status(report.status)),
            )),
            ExitReason::Cancelled => Err(scope.cancellation_error(&tool)),
            ExitReason::Stopped => Ok(report),
        }
    }

    async fn collect(&mut self) -> Result<ExitReport> {
        let tool = self.command.program_name();
        let joined = match self.supervisor.as_mut() {
            Some(handle) => handle.await,
            None => {
                return self
                    .report
                    .clone()
                    .ok_or_else(|| Error::NotRunning(format!("{tool} already exited")));
            }
        };
        self.supervisor = None;
        self.stop_tx = None;
        self.pid = None;
        self.state = ProcessState::Exited;

        if let Some(mut reader) = self.reader.take() {
            let drained = Scope::with_timeout(PROGRESS_DRAIN)
                .run("progress reader", &mut reader)
                .await;
            if drained.is_err() {
                // A grandchild still holds stderr open.
                reader.abort();
            }
        }

        let report = joined
            .map_err(|e| Error::Internal(format!("{tool} supervisor failed: {e}")))??;
        tracing::info!(
            "{tool} exited ({}, reason={:?}, escalated={}, elapsed={:?})",
            describe_status(report.status),
            report.reason,
            report.escalated,
            report.elapsed
        );
        self.report = Some(report.clone());
        Ok(report)
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

fn describe_status(status: Option<ExitStatus>) -> String {
    match status {
        Some(s) => s.to_string(),
        None => "unknown status".to_string(),
    }
}

async fn supervise(
    mut child: Child,
    scope: Scope,
    mut stop_rx: oneshot::Receiver<()>,
    grace_period: Duration,
    tool: String,
) -> Result<ExitReport> {
    let started = Instant::now();

    // Natural exit beats cancellation beats an explicit stop, so a caller
    // that cancels and stops together always sees `Cancelled`.
    let reason = tokio::select! {
        biased;
        status = child.wait() => {
            let status = status.map_err(|e| {
                Error::tool(tool.clone(), format!("I/O error waiting for process: {e}"))
            })?;
            return Ok(ExitReport {
                status: Some(status),
                reason: ExitReason::Natural,
                escalated: false,
                elapsed: started.elapsed(),
            });
        }
        _ = scope.cancelled() => ExitReason::Cancelled,
        // A dropped handle closes the channel, which also stops the process.
        _ = &mut stop_rx => ExitReason::Stopped,
    };

    tracing::info!("Stopping {tool} ({reason:?})");
    let (status, escalated) = graceful_stop(&mut child, grace_period, &tool).await?;
    Ok(ExitReport {
        status,
        reason,
        escalated,
        elapsed: started.elapsed(),
    })
}

async fn graceful_stop(
    child: &mut Child,
    grace_period: Duration,
    tool: &str,
) -> Result<(Option<ExitStatus>, bool)> {
    interrupt(child, tool);

    let grace = Scope::with_timeout(grace_period);
    match grace.run(tool, child.wait()).await {
        Ok(status) => {
            let status = status
                .map_err(|e| Error::tool(tool, format!("I/O error waiting for process: {e}")))?;
            Ok((Some(status), false))
        }
        Err(_) => {
            tracing::warn!("{tool} still running {grace_period:?} after interrupt; killing it");
            child
                .kill()
                .await
                .map_err(|e| Error::tool(tool, format!("failed to kill process: {e}")))?;
            let status = child.wait().await.ok();
            Ok((status, true))
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child, tool: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!("Failed to interrupt {tool} (pid {pid}): {e}"),
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child, tool: &str) {
    // No console interrupt for a detached child here; terminate directly.
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to terminate {tool}: {e}");
    }
}

async fn read_progress(
    stderr: ChildStderr,
    mut parser: ProgressParser,
    sender: Arc<ProgressSender>,
    latest: Arc<Mutex<Option<Progress>>>,
) {
    // Raw bytes: ffmpeg echoes input metadata verbatim, which need not be
    // UTF-8. The pipe must stay drained until EOF or ffmpeg dies on SIGPIPE.
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if let Some(progress) = parser.feed_line(line) {
                    *latest.lock() = Some(progress.clone());
                    sender.send(&progress);
                } else if !line.contains('=') {
                    tracing::trace!("stderr: {line}");
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading progress: {e}");
                break;
            }
        }
    }
}
