//! Pattern matching over yt-dlp diagnostics.
//!
//! yt-dlp reports problems as free text on stderr. A small set of known
//! shapes is translated into short user-facing messages; everything else
//! stays opaque. Raw tool output is never shown to the user.

/// Broad categories of download failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YtDlpErrorKind {
    /// Cookies invalid, rotated or sign-in required
    InvalidCookies,
    /// Video private, removed or region-blocked
    VideoUnavailable,
    /// Timeouts, DNS, connection resets
    NetworkError,
    Unknown,
}

/// Classifies a download failure from the stderr text.
pub fn classify_download_error(stderr: &str) -> YtDlpErrorKind {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("cookies have likely been rotated")
        || stderr_lower.contains("sign in to confirm")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("use --cookies")
    {
        return YtDlpErrorKind::InvalidCookies;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("this video does not exist")
    {
        return YtDlpErrorKind::VideoUnavailable;
    }

    if stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("dns")
        || stderr_lower.contains("failed to connect")
    {
        return YtDlpErrorKind::NetworkError;
    }

    YtDlpErrorKind::Unknown
}

/// Short status-line message for a failed download.
pub fn download_error_message(stderr: &str, exit_code: Option<i32>) -> String {
    match classify_download_error(stderr) {
        YtDlpErrorKind::InvalidCookies => "Download failed: cookies invalid or sign-in required".to_string(),
        YtDlpErrorKind::VideoUnavailable => "Download failed: video unavailable".to_string(),
        YtDlpErrorKind::NetworkError => "Download failed: network problem, try again".to_string(),
        YtDlpErrorKind::Unknown => {
            // Prefer yt-dlp's own one-line diagnostic when it printed one.
            if let Some(line) = stderr.lines().rev().find(|l| l.starts_with("ERROR:")) {
                return line.trim().to_string();
            }
            match exit_code {
                Some(code) => format!("Download error: yt-dlp exited with status {}", code),
                None => "Download error: yt-dlp terminated abnormally".to_string(),
            }
        }
    }
}

/// Maps the stderr of a zero-result listing run to a user-facing message.
///
/// Returns an empty string when no known pattern matches. The empty-but-set
/// message is deliberate: the listing still "failed" from the user's point
/// of view, but there is nothing trustworthy to say about why.
pub fn listing_error_message(stderr_lines: &[String], url: &str) -> String {
    for line in stderr_lines {
        if line.contains("[Errno 101]") || line.contains("[Errno -3]") {
            return "Please check your internet connection".to_string();
        }
        if line.contains("HTTP Error 404") || line.contains("Requested entity was not found") {
            if url.contains("/playlist?list=") {
                return "Playlist not found".to_string();
            }
            return "Channel not found".to_string();
        }
        if line.contains("Private playlist") || line.contains("This playlist is private") {
            return "This playlist is private".to_string();
        }
        if line.contains("Playlist does not exist") {
            return "Playlist does not exist".to_string();
        }
    }

    String::new()
}
