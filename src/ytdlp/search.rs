//! Video search and channel/playlist listings.
//!
//! Everything here is a one-shot run of
//! `yt-dlp --flat-playlist --dump-json --playlist-items 1:N <url>`,
//! one JSON object per stdout line. Zero-result runs get their stderr
//! matched against a small set of known diagnostics.

use crate::core::config::Config;
use crate::core::types::VideoItem;
use crate::download::ytdlp_errors;
use crate::ytdlp::Fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?(?:[^\s]*&)?v=|youtu\.be/|youtube\.com/shorts/)([A-Za-z0-9_-]{11})")
        .unwrap_or_else(|e| panic!("invalid video id regex: {e}"))
});

static CHANNEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"youtube\.com/(@[\w.-]+|channel/[A-Za-z0-9_-]+|c/[\w.-]+)")
        .unwrap_or_else(|e| panic!("invalid channel regex: {e}"))
});

static PLAYLIST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]list=([A-Za-z0-9_-]+)").unwrap_or_else(|e| panic!("invalid playlist regex: {e}")));

/// What a search-box entry turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Direct link to one video: skip the listing and fetch formats
    VideoUrl(String),
    /// Channel page: list its uploads
    ChannelUrl(String),
    /// Playlist link: list its entries
    PlaylistUrl(String),
    /// Free text: run a site search
    Text,
}

/// Classifies a search-box entry. Playlist links win over video links so a
/// `watch?v=..&list=..` URL lists the playlist it belongs to.
pub fn classify_query(query: &str) -> QueryKind {
    let query = query.trim();
    if let Some(id) = extract_playlist_id(query) {
        return QueryKind::PlaylistUrl(id);
    }
    if let Some(id) = extract_video_id(query) {
        return QueryKind::VideoUrl(id);
    }
    if let Some(handle) = extract_channel_handle(query) {
        return QueryKind::ChannelUrl(handle);
    }
    QueryKind::Text
}

pub fn extract_video_id(query: &str) -> Option<String> {
    VIDEO_ID_RE.captures(query).map(|c| c[1].to_string())
}

pub fn extract_channel_handle(query: &str) -> Option<String> {
    CHANNEL_RE.captures(query).map(|c| c[1].to_string())
}

pub fn extract_playlist_id(query: &str) -> Option<String> {
    PLAYLIST_ID_RE.captures(query).map(|c| c[1].to_string())
}

pub fn build_video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Accepts a bare handle ("@name" or "name") or a full channel URL.
pub fn build_channel_url(input: &str) -> String {
    if let Some(handle) = extract_channel_handle(input) {
        return format!("https://www.youtube.com/{}/videos", handle);
    }
    let handle = input.trim().trim_start_matches('@');
    format!("https://www.youtube.com/@{}/videos", handle)
}

/// Accepts a playlist URL or a bare playlist id.
pub fn build_playlist_url(input: &str) -> String {
    let id = extract_playlist_id(input).unwrap_or_else(|| input.trim().to_string());
    format!("https://www.youtube.com/playlist?list={}", id)
}

/// YouTube result-page `sp` parameter for each sort order.
pub fn sort_param(sort_by: &str) -> &'static str {
    match sort_by {
        "date" => "CAI%253D",
        "views" => "CAM%253D",
        "rating" => "CAE%253D",
        _ => "",
    }
}

pub fn build_search_url(query: &str, sort_by: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let sp = sort_param(sort_by);
    if sp.is_empty() {
        format!("https://www.youtube.com/results?search_query={}", encoded)
    } else {
        format!("https://www.youtube.com/results?search_query={}&sp={}", encoded, sp)
    }
}

/// Runs a listing and collects the videos.
///
/// Returns `None` when the run was cancelled from the UI — the cancel path
/// already produced its own message, so a late result must not surface.
/// Otherwise returns the videos plus an error string that is empty on
/// success, empty-but-meaningless on unrecognized zero-result diagnostics,
/// and a short user-facing message for the recognized ones.
pub async fn run_listing(
    fetcher: &Fetcher,
    config: &Config,
    listing_url: &str,
) -> Option<(Vec<VideoItem>, String)> {
    let token = fetcher.begin();

    let mut cmd = Command::new(config.ytdlp_bin());
    if !config.cookies_browser.is_empty() {
        cmd.args(["--cookies-from-browser", &config.cookies_browser]);
    } else if !config.cookies_file.is_empty() {
        cmd.args(["--cookies", &config.cookies_file]);
    }
    cmd.args([
        "--flat-playlist",
        "--dump-json",
        "--playlist-items",
        &format!("1:{}", config.search_limit),
        listing_url,
    ]);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            fetcher.finish(&token);
            if e.kind() == std::io::ErrorKind::NotFound {
                return Some((
                    Vec::new(),
                    "yt-dlp not found. Please install yt-dlp: https://github.com/yt-dlp/yt-dlp#installation"
                        .to_string(),
                ));
            }
            return Some((Vec::new(), format!("Failed to start yt-dlp: {}", e)));
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stderr_task = tokio::spawn(async move {
        let mut lines_out: VecDeque<String> = VecDeque::new();
        if let Some(stream) = stderr {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("yt-dlp stderr: {}", line);
                lines_out.push_back(line);
            }
        }
        lines_out
    });

    let mut videos = Vec::new();
    if let Some(stream) = stdout {
        let mut lines = BufReader::new(stream).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = token.cancelled() => break,
            };
            match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match parse_video_line(trimmed) {
                        Some(video) => videos.push(video),
                        None => {
                            let snippet: String = trimmed.chars().take(120).collect();
                            log::warn!("Failed to parse video entry: {}", snippet);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Listing read error: {}", e);
                    break;
                }
            }
        }
    }

    if token.is_cancelled() {
        let _ = child.start_kill();
    }
    if let Err(e) = child.wait().await {
        log::warn!("yt-dlp listing wait failed: {}", e);
    }
    let stderr_lines: Vec<String> = stderr_task.await.unwrap_or_default().into();

    if fetcher.finish(&token) {
        return None;
    }

    if videos.is_empty() {
        let err = ytdlp_errors::listing_error_message(&stderr_lines, listing_url);
        return Some((videos, err));
    }
    Some((videos, String::new()))
}

/// Parses one `--dump-json --flat-playlist` output line.
fn parse_video_line(line: &str) -> Option<VideoItem> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let id = value.get("id")?.as_str()?.to_string();
    let title = value
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if title.is_empty() {
        return None;
    }
    Some(VideoItem {
        id,
        title,
        channel: value
            .get("channel")
            .or_else(|| value.get("uploader"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        description: value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        views: value.get("view_count").and_then(|v| v.as_f64()).unwrap_or(0.0),
        duration: value.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
    })
}

/// "1:23:45" / "12:34" style duration for the list rows.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// "1.2M" / "34K" style view counts.
pub fn format_views(views: f64) -> String {
    if views >= 1_000_000_000.0 {
        format!("{:.1}B", views / 1_000_000_000.0)
    } else if views >= 1_000_000.0 {
        format!("{:.1}M", views / 1_000_000.0)
    } else if views >= 1_000.0 {
        format!("{:.1}K", views / 1_000.0)
    } else {
        format!("{}", views as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_watch_url() {
        assert_eq!(
            classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            QueryKind::VideoUrl("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            classify_query("https://youtu.be/dQw4w9WgXcQ"),
            QueryKind::VideoUrl("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_classify_playlist_wins_over_video() {
        assert_eq!(
            classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1234abcd"),
            QueryKind::PlaylistUrl("PL1234abcd".to_string())
        );
    }

    #[test]
    fn test_classify_channel_urls() {
        assert_eq!(
            classify_query("https://www.youtube.com/@veritasium"),
            QueryKind::ChannelUrl("@veritasium".to_string())
        );
        assert_eq!(
            classify_query("https://www.youtube.com/channel/UC1234abcd"),
            QueryKind::ChannelUrl("channel/UC1234abcd".to_string())
        );
    }

    #[test]
    fn test_classify_plain_text() {
        assert_eq!(classify_query("rust async tutorial"), QueryKind::Text);
    }

    #[test]
    fn test_build_channel_url_from_bare_handle() {
        assert_eq!(build_channel_url("veritasium"), "https://www.youtube.com/@veritasium/videos");
        assert_eq!(build_channel_url("@veritasium"), "https://www.youtube.com/@veritasium/videos");
    }

    #[test]
    fn test_build_playlist_url() {
        assert_eq!(
            build_playlist_url("https://www.youtube.com/watch?v=a&list=PLxyz"),
            "https://www.youtube.com/playlist?list=PLxyz"
        );
        assert_eq!(build_playlist_url("PLxyz"), "https://www.youtube.com/playlist?list=PLxyz");
    }

    #[test]
    fn test_build_search_url_encodes_query() {
        let url = build_search_url("rust & go", "relevance");
        assert!(url.contains("search_query=rust+%26+go"));
        assert!(!url.contains("&sp="));

        let sorted = build_search_url("x", "views");
        assert!(sorted.ends_with("&sp=CAM%253D"));
    }

    #[test]
    fn test_parse_video_line() {
        let line = r#"{"id":"abc12345678","title":"A Video","channel":"Chan","view_count":1234,"duration":65.0}"#;
        let video = parse_video_line(line).unwrap();
        assert_eq!(video.id, "abc12345678");
        assert_eq!(video.title, "A Video");
        assert_eq!(video.channel, "Chan");
        assert_eq!(video.views, 1234.0);
        assert_eq!(video.duration, 65.0);
    }

    #[test]
    fn test_parse_video_line_rejects_incomplete_entries() {
        assert!(parse_video_line("{}").is_none());
        assert!(parse_video_line(r#"{"id":"x"}"#).is_none());
        assert!(parse_video_line("not json").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(65.0), "1:05");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(0.0), "0:00");
    }

    #[test]
    fn test_format_views() {
        assert_eq!(format_views(999.0), "999");
        assert_eq!(format_views(1_500.0), "1.5K");
        assert_eq!(format_views(2_300_000.0), "2.3M");
    }
}
