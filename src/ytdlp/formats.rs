//! Format enumeration for a single video.
//!
//! One-shot `yt-dlp -J <url>` run; the formats array is classified into the
//! lists the format screen tabs over.

use crate::core::config::Config;
use crate::core::types::{FormatItem, FormatLists, VideoItem};
use crate::ytdlp::Fetcher;
use std::collections::HashSet;
use std::process::Stdio;
use tokio::process::Command;

/// Fetches and classifies the formats of `url`.
///
/// Returns `None` when the run was cancelled. On failure the lists are empty
/// and the error string carries a short message.
pub async fn fetch_formats(fetcher: &Fetcher, config: &Config, url: &str) -> Option<(FormatLists, VideoItem, String)> {
    let token = fetcher.begin();

    let mut cmd = Command::new(config.ytdlp_bin());
    cmd.args(["-J", "--no-playlist", url])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            fetcher.finish(&token);
            return Some((FormatLists::default(), VideoItem::default(), format!("Format fetch error: {}", e)));
        }
    };

    // Dropping the output future kills the child (kill_on_drop), so the
    // cancel arm both aborts the wait and tears the subprocess down.
    let output = tokio::select! {
        output = child.wait_with_output() => output,
        _ = token.cancelled() => {
            fetcher.finish(&token);
            return None;
        }
    };

    if fetcher.finish(&token) {
        return None;
    }

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            return Some((FormatLists::default(), VideoItem::default(), format!("Format fetch error: {}", e)));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first = stderr.lines().find(|l| l.starts_with("ERROR:")).unwrap_or_default();
        log::warn!("Format fetch failed: {}", first);
        return Some((
            FormatLists::default(),
            VideoItem::default(),
            "Format fetch error: could not read video info".to_string(),
        ));
    }

    let data: serde_json::Value = match serde_json::from_slice(&output.stdout) {
        Ok(data) => data,
        Err(e) => {
            return Some((FormatLists::default(), VideoItem::default(), format!("JSON parse error: {}", e)));
        }
    };

    let video = VideoItem {
        id: data.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        title: data
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        channel: data
            .get("channel")
            .or_else(|| data.get("uploader"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        description: String::new(),
        views: data.get("view_count").and_then(|v| v.as_f64()).unwrap_or(0.0),
        duration: data.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
    };

    let formats = classify_formats(data.get("formats").and_then(|v| v.as_array()).unwrap_or(&Vec::new()));
    Some((formats, video, String::new()))
}

/// Splits the raw formats array into the tabbed lists.
pub fn classify_formats(formats: &[serde_json::Value]) -> FormatLists {
    let mut lists = FormatLists::default();

    // Label audio languages only when there is actually more than one.
    let mut audio_languages: HashSet<String> = HashSet::new();
    for format in formats {
        let acodec = str_field(format, "acodec");
        if !acodec.is_empty() && acodec != "none" {
            let lang = language_of(format);
            if !lang.is_empty() && lang != "und" {
                audio_languages.insert(lang);
            }
        }
    }
    let show_language = audio_languages.len() > 1;

    for format in formats {
        let format_id = str_field(format, "format_id");
        let ext = str_field(format, "ext");
        if format_id.is_empty() || ext.is_empty() {
            continue;
        }

        let mut resolution = str_field(format, "resolution");
        if resolution.is_empty() || resolution == "Unknown" {
            resolution = "?".to_string();
        }

        let acodec = str_field(format, "acodec");
        let vcodec = str_field(format, "vcodec");
        let has_audio = !acodec.is_empty() && acodec != "none";
        let has_video = !vcodec.is_empty() && vcodec != "none";
        let is_thumbnail = ext == "mhtml";

        let kind = if has_video && has_audio {
            "video+audio"
        } else if has_video {
            "video-only"
        } else if has_audio {
            "audio-only"
        } else if is_thumbnail {
            "thumbnail"
        } else {
            "unknown"
        };

        let abr = num_field(format, "abr");
        let fps = num_field(format, "fps");
        let tbr = num_field(format, "tbr");
        let mut size = num_field(format, "filesize");
        if size == 0.0 {
            size = num_field(format, "filesize_approx");
        }

        let lang = if show_language && has_audio {
            let l = language_of(format);
            if l.is_empty() || l == "und" {
                "unknown".to_string()
            } else {
                l
            }
        } else {
            String::new()
        };

        let mut title = if kind == "audio-only" {
            if abr > 0.0 {
                format!("{} @{}k", ext, abr as u32)
            } else {
                ext.clone()
            }
        } else if is_thumbnail {
            format_quality(&resolution).to_string()
        } else {
            let mut quality = format_quality(&resolution).to_string();
            if fps > 0.0 {
                quality = format!("{}{:.0}", quality, fps);
            }
            if tbr > 0.0 {
                quality = format!("{} @{}", quality, format_bitrate(tbr));
            }
            format!("{} {}", quality, ext)
        };
        if !lang.is_empty() {
            title = format!("{} [{}]", title, lang);
        }

        let item = FormatItem {
            title,
            format_id,
            size: if size > 0.0 { bytes_to_human(size) } else { String::new() },
            language: lang,
            resolution,
            kind: kind.to_string(),
            abr,
        };

        lists.all.push(item.clone());
        match kind {
            "video+audio" => {
                // Below-360p rungs are noise on the video tab.
                if !item.title.contains("144p") && !item.title.contains("240p") {
                    lists.video.push(item);
                }
            }
            "audio-only" => lists.audio.push(item),
            "thumbnail" => lists.thumbnail.push(item),
            _ => {}
        }
    }

    lists
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn num_field(value: &serde_json::Value, key: &str) -> f64 {
    value.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn language_of(value: &serde_json::Value) -> String {
    let lang = str_field(value, "language");
    if lang.is_empty() {
        str_field(value, "lang")
    } else {
        lang
    }
}

/// "1920x1080" -> "1080p", "3840x2160" -> "4k", unparseable input unchanged.
pub fn format_quality(resolution: &str) -> &str {
    let Some((_, height)) = resolution.split_once('x') else {
        return resolution;
    };
    let Ok(height) = height.parse::<u32>() else {
        return resolution;
    };
    match height {
        h if h >= 4320 => "8k",
        h if h >= 2160 => "4k",
        h if h >= 1440 => "2k",
        h if h >= 1080 => "1080p",
        h if h >= 720 => "720p",
        h if h >= 480 => "480p",
        h if h >= 360 => "360p",
        h if h >= 240 => "240p",
        h if h >= 144 => "144p",
        _ => resolution,
    }
}

/// Bitrate in kbps -> "800kbps" / "2.5Mbps".
pub fn format_bitrate(tbr: f64) -> String {
    if tbr >= 1000.0 {
        format!("{:.1}Mbps", tbr / 1000.0)
    } else {
        format!("{:.0}kbps", tbr)
    }
}

/// Bytes -> "10.00MiB" style figure.
pub fn bytes_to_human(bytes: f64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0}{}", value, UNITS[unit])
    } else {
        format!("{:.2}{}", value, UNITS[unit])
    }
}
