//! Supervised child processes
//!
//! `ProcessRunner` spawns yt-dlp / ffmpeg with piped output and returns a
//! `RunningProcess`: a line-oriented event stream plus the exit status.
//! A cloneable `ProcessHandle` lets another task terminate the child.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// One line of child output, in production order per stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Code(i32),
    /// Killed by a signal (no exit code). Carries the signal number on unix.
    Signal(Option<i32>),
}

impl ProcessExit {
    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ProcessExit::Code(code),
            None => ProcessExit::Signal(signal_of(status)),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: ExitStatus) -> Option<i32> {
    None
}

/// Terminal state of a supervised run
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit: ProcessExit,
    /// `terminate()` was called on this run's handle
    pub terminated: bool,
    /// Last stderr lines (bounded)
    pub stderr_tail: Vec<String>,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit == ProcessExit::Code(0)
    }

    pub fn code(&self) -> Option<i32> {
        match self.exit {
            ProcessExit::Code(code) => Some(code),
            ProcessExit::Signal(_) => None,
        }
    }

    /// Ended because we asked it to
    pub fn was_cancelled(&self) -> bool {
        self.terminated && !self.success()
    }

    pub fn stderr_text(&self) -> String {
        self.stderr_tail.join("\n")
    }
}

/// Cloneable termination handle for a running child
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    /// Cleared once the child is reaped so a recycled pid is never signalled
    pid: Arc<Mutex<Option<u32>>>,
    program: String,
    terminated: Arc<AtomicBool>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid.lock().ok().and_then(|pid| *pid)
    }

    pub fn termination_requested(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn mark_reaped(&self) {
        if let Ok(mut pid) = self.pid.lock() {
            *pid = None;
        }
    }

    /// Sends a single termination request. Later calls are no-ops.
    ///
    /// The signal is sent from the blocking pool when a runtime is available.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.pid().is_none() {
            log::debug!("{} already reaped, nothing to terminate", self.program);
            return;
        }

        let handle = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || handle.signal());
            }
            Err(_) => handle.signal(),
        }
    }

    fn signal(&self) {
        let Some(pid) = self.pid() else {
            log::debug!("{} exited before the termination signal", self.program);
            return;
        };
        log::info!("🛑 Terminating {} (pid {})", self.program, pid);
        if let Err(e) = send_termination(pid) {
            log::warn!("Failed to terminate {} (pid {}): {}", self.program, pid, e);
        }
    }
}

#[cfg(unix)]
fn send_termination(pid: u32) -> std::io::Result<()> {
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        log::debug!("kill -TERM {} exited with {}", pid, status);
    }
    Ok(())
}

#[cfg(windows)]
fn send_termination(pid: u32) -> std::io::Result<()> {
    use std::os::windows::process::CommandExt;
    // Console tools ignore WM_CLOSE, so the tree is ended forcefully in one step.
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .creation_flags(CREATE_NO_WINDOW)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        log::debug!("taskkill /PID {} exited with {}", pid, status);
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn send_termination(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "process termination is not supported on this platform",
    ))
}

/// Spawns supervised children. Holds the directory prepended to PATH.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    search_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children see `dir` first on their PATH (yt-dlp looks up ffmpeg there)
    pub fn with_search_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: Some(dir.into()),
        }
    }

    pub fn spawn<I, S>(&self, program: &Path, args: I) -> AppResult<RunningProcess>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(path) = self.augmented_path() {
            cmd.env("PATH", path);
        }

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        log::debug!("Spawning: {:?}", cmd.as_std());

        let mut child = cmd.spawn().map_err(|source| AppError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

        let program_name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(config::process::STDERR_TAIL_LINES)));

        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone(), ProcessEvent::Stdout, None);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx, ProcessEvent::Stderr, Some(Arc::clone(&tail)));
        }

        let handle = ProcessHandle {
            pid: Arc::new(Mutex::new(child.id())),
            program: program_name,
            terminated: Arc::new(AtomicBool::new(false)),
        };

        Ok(RunningProcess {
            child,
            handle,
            events: rx,
            stderr_tail: tail,
            exit: None,
            drained: false,
        })
    }

    /// Runs a short command to completion and returns its stdout.
    /// Non-zero exits are returned in the outcome, not as errors.
    pub async fn run_to_completion<I, S>(
        &self,
        program: &Path,
        args: I,
        timeout: Duration,
    ) -> AppResult<(ProcessOutcome, String)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut process = self.spawn(program, args)?;

        let collect = async {
            let mut stdout = String::new();
            while let Some(event) = process.next_event().await {
                if let ProcessEvent::Stdout(line) = event {
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
            }
            let outcome = process.wait().await?;
            Ok::<_, AppError>((outcome, stdout))
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result,
            // The dropped child is killed by `kill_on_drop`.
            Err(_) => Err(AppError::NonZeroExit {
                tool: program.display().to_string(),
                code: None,
                kind: None,
                message: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    fn augmented_path(&self) -> Option<std::ffi::OsString> {
        let dir = self.search_dir.as_ref()?;
        let mut paths = vec![dir.clone()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths).ok()
    }
}

fn spawn_reader<R>(
    reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    // Progress bars rewrite the line with bare carriage returns.
                    for segment in text.split(['\r', '\n']).filter(|s| !s.is_empty()) {
                        if let Some(ref tail) = tail {
                            push_tail(tail, segment);
                        }
                        if tx.send(wrap(segment.to_string())).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::debug!("Output reader stopped: {}", e);
                    break;
                }
            }
        }
    });
}

fn push_tail(tail: &Mutex<VecDeque<String>>, line: &str) {
    let Ok(mut tail) = tail.lock() else {
        return;
    };
    if tail.len() == config::process::STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}

/// A spawned child with its output stream
#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    handle: ProcessHandle,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    exit: Option<std::io::Result<ExitStatus>>,
    drained: bool,
}

impl RunningProcess {
    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    fn record_exit(&mut self, status: std::io::Result<ExitStatus>) {
        self.handle.mark_reaped();
        self.exit = Some(status);
    }

    /// Next output line, or `None` once the child exited and its output is drained.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        loop {
            if self.drained {
                return None;
            }

            if self.exit.is_some() {
                return match tokio::time::timeout(config::process::drain_grace(), self.events.recv()).await {
                    Ok(Some(event)) => Some(event),
                    Ok(None) | Err(_) => {
                        self.drained = true;
                        None
                    }
                };
            }

            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => return Some(event),
                    None => {
                        // Both pipes closed; only the exit status is left.
                        self.drained = true;
                        let status = self.child.wait().await;
                        self.record_exit(status);
                        return None;
                    }
                },
                status = self.child.wait() => {
                    self.record_exit(status);
                }
            }
        }
    }

    /// Waits for exit, discarding unread output.
    pub async fn wait(mut self) -> AppResult<ProcessOutcome> {
        while self.next_event().await.is_some() {}

        let status = match self.exit.take() {
            Some(status) => status?,
            None => {
                let status = self.child.wait().await;
                self.handle.mark_reaped();
                status?
            }
        };

        let stderr_tail = self
            .stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default();

        let outcome = ProcessOutcome {
            exit: ProcessExit::from_status(status),
            terminated: self.handle.termination_requested(),
            stderr_tail,
        };
        log::debug!("{} exited: {:?}", self.handle.program, outcome.exit);
        Ok(outcome)
    }
}
