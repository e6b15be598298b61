//! tubetui — terminal UI for searching, downloading and playing online
//! videos by driving yt-dlp and mpv as child processes.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, shared domain types
//! - `download`: the download engine — subprocess lifecycle, progress
//!   parsing, queue sequencing, crash-recovery store
//! - `ytdlp`: one-shot search and format-listing invocations
//! - `player`: mpv playback
//! - `app`: the message-driven state machine and its views

pub mod app;
pub mod core;
pub mod download;
pub mod player;
pub mod ytdlp;

pub use crate::core::{config, AppError, AppResult, Config};
pub use app::App;
pub use download::{DownloadController, UnfinishedStore};
