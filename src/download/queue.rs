//! Sequencing of multi-video batch downloads.
//!
//! A queue run downloads the selected videos one at a time with a single
//! format choice applied to all of them. Items move
//! `pending → downloading → {complete | error | skipped}`; terminal states
//! are final and nothing is retried automatically. A failed item pauses the
//! run for a user decision (retry / skip / cancel the remainder).

use crate::core::types::{DownloadOptions, DownloadRequest, VideoItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Pending,
    Downloading,
    Complete,
    Error,
    Skipped,
}

/// One video within a batch, tracked through its own status.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// 1-based position in the run
    pub index: usize,
    pub video: VideoItem,
    pub status: QueueStatus,
    pub error: Option<String>,
}

/// Aggregate counters over the item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSummary {
    pub complete: usize,
    pub error: usize,
    pub skipped: usize,
}

/// State of one queue run.
#[derive(Debug, Clone)]
pub struct QueueRun {
    items: Vec<QueueItem>,
    pub format_id: String,
    pub is_audio: bool,
    pub abr: f64,
    pub options: DownloadOptions,
    pub cancelled: bool,
}

impl QueueRun {
    pub fn new(videos: Vec<VideoItem>, format_id: String, is_audio: bool, abr: f64, options: DownloadOptions) -> Self {
        let items = videos
            .into_iter()
            .enumerate()
            .map(|(i, video)| QueueItem {
                index: i + 1,
                video,
                status: QueueStatus::Pending,
                error: None,
            })
            .collect();
        Self {
            items,
            format_id,
            is_audio,
            abr,
            options,
            cancelled: false,
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// 1-based index of the item currently in flight or awaiting a decision.
    pub fn current_index(&self) -> usize {
        self.items
            .iter()
            .find(|i| matches!(i.status, QueueStatus::Downloading | QueueStatus::Error))
            .map(|i| i.index)
            .unwrap_or_else(|| self.summary().complete + self.summary().skipped)
    }

    /// Marks the next pending item as downloading and returns the request to
    /// hand to the process controller. `None` when nothing is left to start.
    pub fn begin_next(&mut self) -> Option<DownloadRequest> {
        if self.cancelled {
            return None;
        }
        let format_id = self.format_id.clone();
        let is_audio = self.is_audio;
        let abr = self.abr;
        let options = self.options;
        let item = self.items.iter_mut().find(|i| i.status == QueueStatus::Pending)?;
        item.status = QueueStatus::Downloading;
        Some(DownloadRequest {
            url: item.video.watch_url(),
            format_id,
            is_audio,
            abr,
            title: item.video.title.clone(),
            options,
            cookies_browser: String::new(),
            cookies_file: String::new(),
        })
    }

    /// Records the terminal result of the in-flight item.
    pub fn finish_current(&mut self, result: Result<(), String>) {
        if let Some(item) = self.items.iter_mut().find(|i| i.status == QueueStatus::Downloading) {
            match result {
                Ok(()) => item.status = QueueStatus::Complete,
                Err(msg) => {
                    item.status = QueueStatus::Error;
                    item.error = Some(msg);
                }
            }
        }
    }

    /// User chose to skip the failed item; it stays terminal as skipped.
    pub fn skip_failed(&mut self) {
        if let Some(item) = self.items.iter_mut().find(|i| i.status == QueueStatus::Error) {
            item.status = QueueStatus::Skipped;
        }
    }

    /// User chose to retry the failed item; it goes back to pending so
    /// `begin_next` picks it up again.
    pub fn retry_failed(&mut self) {
        if let Some(item) = self.items.iter_mut().find(|i| i.status == QueueStatus::Error) {
            item.status = QueueStatus::Pending;
            item.error = None;
        }
    }

    /// Aborts the remainder of the run: everything not yet terminal becomes
    /// skipped and the run is flagged cancelled.
    pub fn cancel_remaining(&mut self) {
        for item in &mut self.items {
            if matches!(
                item.status,
                QueueStatus::Pending | QueueStatus::Downloading | QueueStatus::Error
            ) {
                item.status = QueueStatus::Skipped;
            }
        }
        self.cancelled = true;
    }

    /// True while an item sits in `error` waiting for a user decision.
    pub fn awaiting_decision(&self) -> bool {
        self.items.iter().any(|i| i.status == QueueStatus::Error)
    }

    /// Error text of the item awaiting a decision.
    pub fn blocking_error(&self) -> Option<&str> {
        self.items
            .iter()
            .find(|i| i.status == QueueStatus::Error)
            .and_then(|i| i.error.as_deref())
    }

    /// True once every item reached a terminal state and no decision is pending.
    pub fn is_finished(&self) -> bool {
        self.items.iter().all(|i| {
            matches!(
                i.status,
                QueueStatus::Complete | QueueStatus::Skipped
            )
        }) || (self.cancelled
            && self
                .items
                .iter()
                .all(|i| !matches!(i.status, QueueStatus::Pending | QueueStatus::Downloading)))
    }

    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary::default();
        for item in &self.items {
            match item.status {
                QueueStatus::Complete => summary.complete += 1,
                QueueStatus::Error => summary.error += 1,
                QueueStatus::Skipped => summary.skipped += 1,
                QueueStatus::Pending | QueueStatus::Downloading => {}
            }
        }
        summary
    }
}
