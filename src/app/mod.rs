//! The single-threaded model behind the TUI.
//!
//! All mutation happens in [`App::update`] on the event-loop task; every
//! other component talks to it through messages. The struct fields are the
//! observable state the views render from.

pub mod msg;
pub mod update;
pub mod view;

use crate::core::config::Config;
use crate::core::types::{FormatLists, VideoItem};
use crate::download::queue::QueueRun;
use crate::download::unfinished::UnfinishedDownload;
use std::collections::BTreeSet;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SearchInput,
    Loading(LoadingKind),
    VideoList,
    FormatList,
    Download,
    VideoPlaying,
}

/// What the Loading screen is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingKind {
    Search,
    Channel,
    Playlist,
    Formats,
}

/// Tabs on the format screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTab {
    Video,
    Audio,
    Thumbnail,
}

impl FormatTab {
    pub fn next(self) -> Self {
        match self {
            FormatTab::Video => FormatTab::Audio,
            FormatTab::Audio => FormatTab::Thumbnail,
            FormatTab::Thumbnail => FormatTab::Video,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormatTab::Video => FormatTab::Thumbnail,
            FormatTab::Audio => FormatTab::Video,
            FormatTab::Thumbnail => FormatTab::Audio,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormatTab::Video => "Video",
            FormatTab::Audio => "Audio",
            FormatTab::Thumbnail => "Thumbnail",
        }
    }
}

/// Observable state of the download screen.
///
/// A new session resets every field here; stale values from a previous
/// session must never leak into a new one.
#[derive(Debug, Default)]
pub struct DownloadState {
    pub video: VideoItem,
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    pub phase: String,
    pub destination: String,
    pub file_extension: String,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
    pub error: String,
    pub queue: Option<QueueRun>,
}

impl DownloadState {
    /// Clears the per-session display fields. The queue outlives sessions
    /// (one session per item) and is managed by its own transitions.
    pub fn reset_session(&mut self) {
        self.percent = 0.0;
        self.speed.clear();
        self.eta.clear();
        self.phase.clear();
        self.destination.clear();
        self.file_extension.clear();
        self.paused = false;
        self.completed = false;
        self.cancelled = false;
        self.error.clear();
    }
}

pub struct App {
    pub config: Config,
    pub state: State,
    pub should_quit: bool,
    pub spinner_frame: usize,
    pub err_msg: String,

    // Search screen
    pub query_input: String,
    pub current_query: String,
    pub unfinished: Vec<UnfinishedDownload>,

    // Video list
    pub videos: Vec<VideoItem>,
    pub video_cursor: usize,
    /// Indices marked for a queue download
    pub marked: BTreeSet<usize>,

    // Format list
    pub formats: FormatLists,
    pub format_tab: FormatTab,
    pub format_cursor: usize,
    pub format_url: String,
    pub selected_video: VideoItem,
    /// Videos a queue run will cover once a format is chosen
    pub queue_videos: Vec<VideoItem>,

    pub download: DownloadState,

    // Playback
    pub playing: VideoItem,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::SearchInput,
            should_quit: false,
            spinner_frame: 0,
            err_msg: String::new(),
            query_input: String::new(),
            current_query: String::new(),
            unfinished: Vec::new(),
            videos: Vec::new(),
            video_cursor: 0,
            marked: BTreeSet::new(),
            formats: FormatLists::default(),
            format_tab: FormatTab::Video,
            format_cursor: 0,
            format_url: String::new(),
            selected_video: VideoItem::default(),
            queue_videos: Vec::new(),
            download: DownloadState::default(),
            playing: VideoItem::default(),
        }
    }

    /// Formats visible under the active tab.
    pub fn visible_formats(&self) -> &[crate::core::types::FormatItem] {
        match self.format_tab {
            FormatTab::Video => &self.formats.video,
            FormatTab::Audio => &self.formats.audio,
            FormatTab::Thumbnail => &self.formats.thumbnail,
        }
    }
}
