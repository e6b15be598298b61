use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Cached ffmpeg binary path
/// Read from FFMPEG_BIN environment variable or defaults to "ffmpeg"
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// Cached mpv binary path
/// Read from MPV_BIN environment variable or defaults to "mpv"
pub static MPV_BIN: Lazy<String> = Lazy::new(|| env::var("MPV_BIN").unwrap_or_else(|_| "mpv".to_string()));

/// Default number of search results requested from yt-dlp
pub const DEFAULT_SEARCH_LIMIT: u32 = 25;

/// Default yt-dlp format selector used for playback
pub const DEFAULT_FORMAT: &str = "bestvideo+bestaudio/best";

/// User configuration, persisted as JSON in the platform config directory.
///
/// Every field has a default so a missing or partially-written file still
/// loads. The app treats the loaded value as read-only; mutation happens
/// only through `save` on exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum number of videos fetched per search/channel/playlist listing
    pub search_limit: u32,
    /// Directory downloads are written to (tilde-expanded on use)
    pub download_path: String,
    /// Default yt-dlp format selector (playback and resume)
    pub default_format: String,
    /// Search result ordering: "relevance", "date", "views" or "rating"
    pub sort_by: String,
    /// Pass --embed-subs to yt-dlp
    pub embed_subtitles: bool,
    /// Pass --embed-metadata to yt-dlp
    pub embed_metadata: bool,
    /// Pass --embed-chapters to yt-dlp
    pub embed_chapters: bool,
    /// Browser to extract cookies from (takes precedence over cookies_file)
    pub cookies_browser: String,
    /// Path to a Netscape cookies file
    pub cookies_file: String,
    /// Override for the yt-dlp binary path (empty = YTDL_BIN env / "yt-dlp")
    pub ytdlp_path: String,
    /// Override for the ffmpeg binary path (empty = FFMPEG_BIN env / "ffmpeg")
    pub ffmpeg_path: String,
    /// Override for the mpv binary path (empty = MPV_BIN env / "mpv")
    pub mpv_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            download_path: "~/Downloads".to_string(),
            default_format: DEFAULT_FORMAT.to_string(),
            sort_by: "relevance".to_string(),
            embed_subtitles: false,
            embed_metadata: true,
            embed_chapters: true,
            cookies_browser: String::new(),
            cookies_file: String::new(),
            ytdlp_path: String::new(),
            ffmpeg_path: String::new(),
            mpv_path: String::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, falling back to defaults when the
    /// file is missing or unreadable. A corrupt file is logged and ignored
    /// rather than surfaced; the config is a convenience, not critical state.
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("Config file {} is corrupt ({}), using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read config {}: {}", path.display(), e);
                }
                Self::default()
            }
        }
    }

    /// Loads from the default platform location.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Persists the configuration atomically (temp file + rename) so a crash
    /// mid-write never leaves a truncated file behind.
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            e
        })
    }

    /// Persists to the default platform location.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&config_file_path())
    }

    /// Effective yt-dlp binary: config override, then YTDL_BIN env, then "yt-dlp".
    pub fn ytdlp_bin(&self) -> String {
        if self.ytdlp_path.is_empty() {
            YTDL_BIN.clone()
        } else {
            self.ytdlp_path.clone()
        }
    }

    /// Effective ffmpeg binary.
    pub fn ffmpeg_bin(&self) -> String {
        if self.ffmpeg_path.is_empty() {
            FFMPEG_BIN.clone()
        } else {
            self.ffmpeg_path.clone()
        }
    }

    /// Effective mpv binary.
    pub fn mpv_bin(&self) -> String {
        if self.mpv_path.is_empty() {
            MPV_BIN.clone()
        } else {
            self.mpv_path.clone()
        }
    }

    /// Download directory with tilde expansion applied.
    pub fn expanded_download_path(&self) -> String {
        shellexpand::tilde(&self.download_path).into_owned()
    }
}

/// Path of the JSON config file in the platform config directory.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubetui")
        .join("config.json")
}

/// Per-user data directory (unfinished-download store, log file).
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubetui")
}
