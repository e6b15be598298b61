//! The closed message set driving the state machine, and the command values
//! the machine hands back for execution.
//!
//! Every asynchronous operation is represented as a [`Command`] — a deferred
//! computation the runtime executes on its own task — rather than a raw
//! callback. `update` stays a pure function of (state, message), which is
//! what makes the state machine testable without a terminal or a runtime.

use crate::core::types::{DownloadOutcome, DownloadRequest, FormatLists, VideoItem};
use crate::download::progress::ProgressUpdate;
use crate::download::unfinished::UnfinishedDownload;
use crossterm::event::KeyEvent;

/// Which one-shot fetch a Loading screen belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Search,
    Channel,
    Playlist,
    Formats,
}

/// Everything the event loop can deliver to the state machine.
#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Resize,
    Tick,

    /// Kick off a listing or, for direct video URLs, a format fetch
    StartSearch { query: String },
    ListingDone { videos: Vec<VideoItem>, err: String },
    StartFormats { url: String, video: VideoItem },
    FormatsDone {
        formats: FormatLists,
        video: VideoItem,
        err: String,
    },
    /// A loading-screen fetch was cancelled by the user
    FetchCancelled { kind: FetchKind },

    StartDownload(DownloadRequest),
    StartQueue {
        videos: Vec<VideoItem>,
        format_id: String,
        is_audio: bool,
        abr: f64,
    },
    Progress(ProgressUpdate),
    /// The single terminal result of a download session
    DownloadFinished(DownloadOutcome),
    DownloadPaused,
    DownloadResumed,
    /// Optimistic acknowledgement of a cancel request; the session's own
    /// terminal message follows once the subprocess is actually down
    DownloadCancelled,

    UnfinishedLoaded(Vec<UnfinishedDownload>),

    PlayerStarted { video: VideoItem },
    PlayerExited { error: String },

    Quit,
}

/// Deferred operations returned by `update`. Each one eventually produces
/// its messages through the shared inbox; none of them block the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search { query: String },
    ChannelListing { name: String },
    PlaylistListing { query: String },
    FetchFormats { url: String },
    CancelFetch { kind: FetchKind },

    StartDownload(DownloadRequest),
    PauseDownload,
    ResumeDownload,
    CancelDownload,

    SaveUnfinished(UnfinishedDownload),
    ClearUnfinished { url: String },
    LoadUnfinished,

    Play {
        url: String,
        format: String,
        video: VideoItem,
    },
    StopPlayer,

    Many(Vec<Command>),
}
