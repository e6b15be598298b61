//! One-shot yt-dlp invocations: search/channel/playlist listings and format
//! enumeration. Pure request/response — no pause/resume or queue semantics —
//! but a run in flight can be cancelled from the UI.

pub mod formats;
pub mod search;

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Handle for the single listing/format run in flight.
///
/// Mirrors the download controller's session ownership in miniature: one
/// run at a time, a fresh token per run, and a cancelled run produces no
/// result message (the cancel command itself reports back to the UI).
pub struct Fetcher {
    current: Mutex<Option<CancellationToken>>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Registers a new run, superseding any previous one.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = guard.replace(token.clone()) {
            prev.cancel();
        }
        token
    }

    /// Cancels the run in flight, if any.
    pub fn cancel(&self) {
        let guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = guard.as_ref() {
            token.cancel();
        }
    }

    /// Clears the handle and reports whether the run had been cancelled.
    pub fn finish(&self, token: &CancellationToken) -> bool {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
        token.is_cancelled()
    }
}
