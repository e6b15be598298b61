//! mpv playback.
//!
//! Fire-and-forget: the player is started, its exit is observed and
//! reported, nothing else. One foreground player at a time; starting a new
//! one stops the old one first.

use crate::core::config::Config;
use crate::core::types::VideoItem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Outcome of a playback attempt, reported back to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started { video: VideoItem },
    Exited { error: String },
}

struct PlayerState {
    /// Set before the kill so the wait task knows not to report the exit.
    killed_intentionally: Arc<AtomicBool>,
    kill: tokio::sync::mpsc::UnboundedSender<()>,
}

/// Owner of the single playback subprocess.
pub struct PlayerManager {
    current: Mutex<Option<PlayerState>>,
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerManager {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        let guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        guard.is_some()
    }

    /// Stops the running player, if any, without reporting its exit.
    pub fn kill(&self) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = guard.take() {
            state.killed_intentionally.store(true, Ordering::SeqCst);
            let _ = state.kill.send(());
        }
    }

    /// Starts mpv for `url` and emits events on `events`: one `Started` (or
    /// `Exited` with an error when the spawn fails) now, and one `Exited`
    /// later unless the player was stopped intentionally.
    pub fn play(
        self: Arc<Self>,
        config: &Config,
        url: &str,
        format_selector: &str,
        video: VideoItem,
        events: tokio::sync::mpsc::UnboundedSender<PlayerEvent>,
    ) {
        // Replacing the player means the old exit must not be reported.
        self.kill();

        let mut cmd = tokio::process::Command::new(config.mpv_bin());
        if !format_selector.is_empty() {
            cmd.arg(format!("--ytdl-format={}", format_selector));
        }
        cmd.arg(url)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Failed to start mpv: {}", e);
                let _ = events.send(PlayerEvent::Exited {
                    error: format!("Failed to play video with mpv: {}", e),
                });
                return;
            }
        };

        let killed = Arc::new(AtomicBool::new(false));
        let (kill_tx, mut kill_rx) = tokio::sync::mpsc::unbounded_channel();
        {
            let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(PlayerState {
                killed_intentionally: Arc::clone(&killed),
                kill: kill_tx,
            });
        }

        let _ = events.send(PlayerEvent::Started { video });

        let manager = self;
        tokio::spawn(async move {
            let result = tokio::select! {
                result = child.wait() => result,
                _ = kill_rx.recv() => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };

            {
                let mut guard = manager.current.lock().unwrap_or_else(|e| e.into_inner());
                *guard = None;
            }

            if killed.load(Ordering::SeqCst) {
                return;
            }
            let error = match result {
                Ok(status) if status.success() => String::new(),
                Ok(status) => {
                    log::warn!("mpv exited with {}", status);
                    String::new()
                }
                Err(e) => format!("mpv wait failed: {}", e),
            };
            let _ = events.send(PlayerEvent::Exited { error });
        });
    }
}
