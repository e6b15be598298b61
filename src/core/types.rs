use serde::{Deserialize, Serialize};

/// One video as returned by a search, channel or playlist listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub description: String,
    pub views: f64,
    pub duration: f64,
}

impl VideoItem {
    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// One downloadable format of a video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatItem {
    /// Human label shown in the list, e.g. "1080p60 @2.5Mbps mp4"
    pub title: String,
    /// yt-dlp format id passed to -f
    pub format_id: String,
    /// Human-readable size ("12.3MiB") or empty when unknown
    pub size: String,
    pub language: String,
    pub resolution: String,
    /// "video+audio", "video-only", "audio-only", "thumbnail" or "unknown"
    pub kind: String,
    /// Audio bitrate in kbps, 0 when not an audio format
    pub abr: f64,
}

/// Format lists grouped the way the format screen tabs them.
#[derive(Debug, Clone, Default)]
pub struct FormatLists {
    pub video: Vec<FormatItem>,
    pub audio: Vec<FormatItem>,
    pub thumbnail: Vec<FormatItem>,
    pub all: Vec<FormatItem>,
}

/// Post-processing switches forwarded to yt-dlp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub embed_subtitles: bool,
    pub embed_metadata: bool,
    pub embed_chapters: bool,
}

/// An intent to download one item. Immutable once issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    /// True when the format was picked from the audio tab (extract mp3)
    pub is_audio: bool,
    /// Target audio bitrate in kbps (audio requests only)
    pub abr: f64,
    pub title: String,
    pub options: DownloadOptions,
    /// Browser to take cookies from; takes precedence over cookies_file
    pub cookies_browser: String,
    pub cookies_file: String,
}

/// Terminal result of one download session. Emitted exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed,
    Cancelled,
    Failed(String),
}
