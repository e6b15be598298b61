//! Lifecycle of the single active download subprocess.
//!
//! The controller owns at most one session at a time: the running yt-dlp
//! child, its cancellation token and the paused flag. `pause`/`resume`/
//! `cancel` may race with the session's own exit path, so the handle lives
//! behind a mutex. Exactly one terminal [`SessionEvent::Finished`] is
//! emitted per session, from a single place at the end of the run.

use crate::core::config::Config;
use crate::core::types::{DownloadOutcome, DownloadRequest};
use crate::download::builder;
use crate::download::progress::{ProgressParser, ProgressUpdate};
use crate::download::unfinished::{UnfinishedDownload, UnfinishedStore};
use crate::download::ytdlp_errors;
use chrono::Utc;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// How long a cancelled subprocess gets to exit before it is killed outright.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Cap on the retained stderr tail used for failure diagnostics.
const STDERR_TAIL_LINES: usize = 200;

/// Events a session pushes into the UI inbox.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress(ProgressUpdate),
    Finished(DownloadOutcome),
}

/// Live state of the active session.
struct SessionHandle {
    /// Generation counter distinguishing this session from a superseded one
    id: u64,
    pid: Option<u32>,
    cancel: CancellationToken,
    paused: bool,
}

/// Owner of the download subprocess lifecycle.
pub struct DownloadController {
    session: Mutex<Option<SessionHandle>>,
    store: Arc<UnfinishedStore>,
    next_session_id: std::sync::atomic::AtomicU64,
}

impl DownloadController {
    pub fn new(store: Arc<UnfinishedStore>) -> Self {
        Self {
            session: Mutex::new(None),
            store,
            next_session_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Whether this platform can suspend a running subprocess. Where it
    /// cannot, pause/resume still flip the logical flag but leave the
    /// process running — a documented limitation, not an error.
    pub fn supports_suspend(&self) -> bool {
        cfg!(unix)
    }

    /// Starts a session for `request`. Any prior session is cancelled first;
    /// two subprocesses never run at once.
    pub fn start(self: Arc<Self>, request: DownloadRequest, config: &Config, events: UnboundedSender<SessionEvent>) {
        let invocation = builder::build_invocation(&request, config);
        log::info!("yt-dlp args: {:?}", invocation.args);

        let mut cmd = Command::new(config.ytdlp_bin());
        cmd.args(&invocation.args);
        self.begin(request, cmd, invocation.file_extension, events);
    }

    /// Registers a session handle and spawns the session task. Split from
    /// `start` so tests can drive the lifecycle with a stub command.
    fn begin(
        self: Arc<Self>,
        request: DownloadRequest,
        cmd: Command,
        file_extension: String,
        events: UnboundedSender<SessionEvent>,
    ) {
        let cancel = CancellationToken::new();
        let id = self
            .next_session_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = guard.take() {
                log::warn!("Starting a download while a session is active; cancelling the old one");
                prev.cancel.cancel();
            }
            *guard = Some(SessionHandle {
                id,
                pid: None,
                cancel: cancel.clone(),
                paused: false,
            });
        }

        tokio::spawn(async move {
            self.run_session(id, request, cmd, file_extension, cancel, events).await;
        });
    }

    /// Runs one session to completion and emits its single terminal event.
    async fn run_session(
        self: Arc<Self>,
        id: u64,
        request: DownloadRequest,
        mut cmd: Command,
        file_extension: String,
        cancel: CancellationToken,
        events: UnboundedSender<SessionEvent>,
    ) {
        // Recovery record goes in before the subprocess exists, so a crash
        // between here and spawn still leaves a trace.
        self.store
            .add(UnfinishedDownload {
                url: request.url.clone(),
                urls: Vec::new(),
                videos: Vec::new(),
                format_id: request.format_id.clone(),
                title: request.title.clone(),
                description: String::new(),
                timestamp: Utc::now(),
            })
            .await;

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start downloader: {}", e);
                self.clear(id);
                let _ = events.send(SessionEvent::Finished(DownloadOutcome::Failed(format!(
                    "Failed to start downloader: {}",
                    e
                ))));
                return;
            }
        };

        let pid = child.id();
        {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(handle) = guard.as_mut() {
                if handle.id == id {
                    handle.pid = pid;
                }
            }
        }

        // Both output streams feed one parser through one ordered channel;
        // their relative interleaving is arbitrary and does not matter.
        let parser = Arc::new(Mutex::new(ProgressParser::new(&file_extension)));
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        let stdout_reader = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(read_stream(stream, Arc::clone(&parser), None, events.clone())));
        let stderr_reader = child.stderr.take().map(|stream| {
            tokio::spawn(read_stream(
                stream,
                Arc::clone(&parser),
                Some(Arc::clone(&stderr_tail)),
                events.clone(),
            ))
        });

        let mut wait_result = None;
        tokio::select! {
            result = child.wait() => { wait_result = Some(result); }
            _ = cancel.cancelled() => {}
        }
        if wait_result.is_none() {
            self.terminate(&mut child, pid).await;
        }

        if let Some(handle) = stdout_reader {
            let _ = handle.await;
        }
        if let Some(handle) = stderr_reader {
            let _ = handle.await;
        }

        let outcome = if cancel.is_cancelled() {
            DownloadOutcome::Cancelled
        } else {
            match wait_result {
                Some(Ok(status)) if status.success() => {
                    self.store.remove(&request.url).await;
                    DownloadOutcome::Completed
                }
                Some(Ok(status)) => {
                    let tail: Vec<String> = {
                        let guard = stderr_tail.lock().unwrap_or_else(|e| e.into_inner());
                        guard.iter().cloned().collect()
                    };
                    DownloadOutcome::Failed(ytdlp_errors::download_error_message(&tail.join("\n"), status.code()))
                }
                Some(Err(e)) => DownloadOutcome::Failed(format!("Download error: {}", e)),
                None => DownloadOutcome::Cancelled,
            }
        };

        self.clear(id);
        let _ = events.send(SessionEvent::Finished(outcome));
    }

    /// Suspends the running subprocess where the platform allows it, and
    /// flips the paused flag either way. Returns the new flag value, or
    /// `None` when no session is active.
    pub fn pause(&self) -> Option<bool> {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let handle = guard.as_mut()?;
        if !handle.paused {
            if let Some(pid) = handle.pid {
                signal_group(pid, Signal::Stop);
            }
            handle.paused = true;
        }
        Some(handle.paused)
    }

    /// Resumes a suspended subprocess; the mirror of [`pause`](Self::pause).
    pub fn resume(&self) -> Option<bool> {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let handle = guard.as_mut()?;
        if handle.paused {
            if let Some(pid) = handle.pid {
                signal_group(pid, Signal::Continue);
            }
            handle.paused = false;
        }
        Some(handle.paused)
    }

    pub fn is_paused(&self) -> bool {
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|s| s.paused).unwrap_or(false)
    }

    pub fn has_session(&self) -> bool {
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        guard.is_some()
    }

    /// Cancels the active session. Fire-and-forget and idempotent: teardown
    /// is asynchronous and only the terminal event confirms the exit.
    pub fn cancel(&self) {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = guard.as_mut() {
            // A stopped process cannot act on SIGTERM; wake it first.
            if handle.paused {
                if let Some(pid) = handle.pid {
                    signal_group(pid, Signal::Continue);
                }
                handle.paused = false;
            }
            handle.cancel.cancel();
        }
    }

    /// Releases the session record after the subprocess has exited. A
    /// superseded session must not clobber the handle of its replacement.
    fn clear(&self, id: u64) {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().map(|s| s.id) == Some(id) {
            *guard = None;
        }
    }

    /// Terminates the subprocess and any descendants it spawned for
    /// post-processing: SIGTERM to the process group, bounded grace, SIGKILL.
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) {
        if let Some(pid) = pid {
            signal_group(pid, Signal::Terminate);
        } else {
            let _ = child.start_kill();
        }

        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                log::warn!("Downloader did not exit within {:?}, killing", KILL_GRACE);
                if let Some(pid) = pid {
                    signal_group(pid, Signal::Kill);
                }
                let _ = child.kill().await;
            }
        }
    }
}

/// Reads one output stream line by line, feeding the shared parser and
/// (for stderr) a bounded diagnostic tail.
async fn read_stream<R: AsyncRead + Unpin>(
    stream: R,
    parser: Arc<Mutex<ProgressParser>>,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
    events: UnboundedSender<SessionEvent>,
) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(tail) = &tail {
            let mut guard = tail.lock().unwrap_or_else(|e| e.into_inner());
            if guard.len() >= STDERR_TAIL_LINES {
                guard.pop_front();
            }
            guard.push_back(line.clone());
        }
        let update = {
            let mut guard = parser.lock().unwrap_or_else(|e| e.into_inner());
            guard.feed_line(&line)
        };
        if let Some(update) = update {
            let _ = events.send(SessionEvent::Progress(update));
        }
    }
}

enum Signal {
    Stop,
    Continue,
    Terminate,
    Kill,
}

/// Sends `signal` to the subprocess's process group.
#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Stop => libc::SIGSTOP,
        Signal::Continue => libc::SIGCONT,
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // The child was spawned as its own process group leader, so the negated
    // pid reaches yt-dlp plus any ffmpeg it forked.
    let result = unsafe { libc::kill(-(pid as i32), sig) };
    if result != 0 {
        log::debug!(
            "kill({}) for pgid {} failed: {}",
            sig,
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, signal: Signal) {
    match signal {
        Signal::Stop | Signal::Continue => {
            log::info!("Process suspension is not supported on this platform");
        }
        Signal::Terminate | Signal::Kill => {}
    }
}
