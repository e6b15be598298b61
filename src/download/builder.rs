//! yt-dlp argument construction for download sessions.
//!
//! Translates a `DownloadRequest` plus the current configuration into the
//! argument list handed to the subprocess, and decides the expected output
//! extension.

use crate::core::config::Config;
use crate::core::types::DownloadRequest;
use std::path::Path;

/// Argument list and expected file extension for one download invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadInvocation {
    pub args: Vec<String>,
    pub file_extension: String,
}

/// True for URLs that address a whole playlist rather than a single video.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("/playlist?list=") || url.contains("&list=")
}

/// Builds the yt-dlp invocation for `request`.
///
/// Shape: `[cookies] [--no-playlist] -o <template> <mode flags> -f <id>
/// --newline -R infinite <url> [post-processing flags]`. Audio requests
/// extract and transcode to mp3 at the requested bitrate; video requests
/// merge/remux into mp4.
pub fn build_invocation(request: &DownloadRequest, config: &Config) -> DownloadInvocation {
    let output_dir = config.expanded_download_path();

    let mut args: Vec<String> = vec![
        "-f".to_string(),
        request.format_id.clone(),
        "--newline".to_string(),
        "-R".to_string(),
        "infinite".to_string(),
        request.url.clone(),
    ];

    let file_extension;
    if request.is_audio {
        file_extension = ".mp3".to_string();
        let quality = format!("{}K", request.abr as u32);
        let template = Path::new(&output_dir)
            .join("%(artist)s - %(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();
        let mut prefix = vec![
            "-o".to_string(),
            template,
            "--restrict-filenames".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            quality,
            "--add-metadata".to_string(),
            "--metadata-from-title".to_string(),
            "%(artist)s - %(title)s".to_string(),
        ];
        prefix.append(&mut args);
        args = prefix;
    } else {
        file_extension = ".mp4".to_string();
        let template = Path::new(&output_dir)
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();
        let mut prefix = vec![
            "-o".to_string(),
            template,
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--remux-video".to_string(),
            "mp4".to_string(),
        ];
        prefix.append(&mut args);
        args = prefix;
    }

    if !is_playlist_url(&request.url) {
        args.insert(0, "--no-playlist".to_string());
    }

    // Request-level cookies fall back to the configured ones; a browser
    // source wins over a cookie file.
    let browser = if request.cookies_browser.is_empty() {
        config.cookies_browser.as_str()
    } else {
        request.cookies_browser.as_str()
    };
    let file = if request.cookies_file.is_empty() {
        config.cookies_file.as_str()
    } else {
        request.cookies_file.as_str()
    };
    if !browser.is_empty() {
        args.splice(0..0, ["--cookies-from-browser".to_string(), browser.to_string()]);
    } else if !file.is_empty() {
        args.splice(0..0, ["--cookies".to_string(), file.to_string()]);
    }

    if request.options.embed_subtitles {
        args.push("--embed-subs".to_string());
    }
    if request.options.embed_metadata {
        args.push("--embed-metadata".to_string());
    }
    if request.options.embed_chapters {
        args.push("--embed-chapters".to_string());
    }

    DownloadInvocation { args, file_extension }
}
