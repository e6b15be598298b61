//! Download engine: argument construction, the subprocess lifecycle
//! controller, streamed progress parsing, queue sequencing and the
//! crash-recovery store.

pub mod builder;
pub mod controller;
pub mod progress;
pub mod queue;
pub mod unfinished;
pub mod ytdlp_errors;

pub use controller::{DownloadController, SessionEvent};
pub use progress::{ProgressParser, ProgressUpdate};
pub use queue::{QueueRun, QueueStatus, QueueSummary};
pub use unfinished::{UnfinishedDownload, UnfinishedStore};
