//! Streaming parser for yt-dlp output lines.
//!
//! yt-dlp with `--newline` emits one status line per progress step, e.g.
//!
//! ```text
//! [download] Destination: /home/user/Downloads/Some Title.mp4
//! [download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10
//! [Merger] Merging formats into "/home/user/Downloads/Some Title.mp4"
//! ```
//!
//! The parser is stateful per session: fields it has seen stick until a
//! later line changes them, and it only reports when something actually
//! changed or a full progress line arrived. Lines it does not recognize are
//! dropped silently — stderr noise is normal, not an error.

/// One structured update derived from subprocess output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Percent complete, 0-100 as reported (monotonicity is enforced by the consumer)
    pub percent: f64,
    /// Human-readable transfer speed ("1.5MiB/s"), may be empty
    pub speed: String,
    /// Human-readable time remaining ("00:10"), may be empty
    pub eta: String,
    /// Raw phase token from the line, e.g. "[download]" or "[Merger]"
    pub status: String,
    /// Destination path once the subprocess announced it
    pub destination: String,
    /// Expected extension of the output file (".mp4" / ".mp3")
    pub file_extension: String,
}

/// Line parser holding the last known fields for one download session.
#[derive(Debug)]
pub struct ProgressParser {
    current: ProgressUpdate,
}

impl ProgressParser {
    pub fn new(file_extension: &str) -> Self {
        Self {
            current: ProgressUpdate {
                file_extension: file_extension.to_string(),
                ..Default::default()
            },
        }
    }

    /// Feeds one output line. Returns the merged state when the line carried
    /// new information, `None` otherwise.
    pub fn feed_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(status) = bracketed_token(line) else {
            return None;
        };

        if status == "[download]" {
            if let Some(dest) = line.split("Destination:").nth(1) {
                return self.apply(|cur| {
                    cur.status = status.to_string();
                    cur.destination = dest.trim().to_string();
                });
            }
            if line.contains('%') {
                return self.apply_progress_line(line);
            }
            // Other [download] chatter ("Resuming...", "100% of ..." is
            // covered by the percent branch) carries nothing we track.
            return None;
        }

        // Any other bracketed line is a phase change ([Merger], [ExtractAudio],
        // [Metadata], ...). Some of them also announce the final path.
        self.apply(|cur| {
            cur.status = status.to_string();
            if let Some(dest) = line.split("Destination:").nth(1) {
                cur.destination = dest.trim().to_string();
            } else if let Some(dest) = merge_destination(line) {
                cur.destination = dest;
            }
        })
    }

    /// A full progress line always reports, even when nothing changed, so the
    /// consumer sees a heartbeat while the transfer crawls.
    fn apply_progress_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut percent = None;
        let mut speed = None;
        let mut eta = None;

        for (i, part) in parts.iter().enumerate() {
            if let Some(stripped) = part.strip_suffix('%') {
                if let Ok(p) = stripped.parse::<f64>() {
                    percent = Some(p.clamp(0.0, 100.0));
                }
            }
            if *part == "at" && i + 1 < parts.len() && parts[i + 1] != "Unknown" {
                speed = Some(parts[i + 1].to_string());
            }
            if *part == "ETA" && i + 1 < parts.len() && parts[i + 1] != "Unknown" {
                eta = Some(parts[i + 1].to_string());
            }
        }

        // A [download] line with a '%' somewhere that is not a percent figure
        // is not a progress line; nothing is committed for it.
        let percent = percent?;
        self.current.percent = percent;
        if let Some(speed) = speed {
            self.current.speed = speed;
        }
        if let Some(eta) = eta {
            self.current.eta = eta;
        }
        self.current.status = "[download]".to_string();
        Some(self.current.clone())
    }

    fn apply<F: FnOnce(&mut ProgressUpdate)>(&mut self, f: F) -> Option<ProgressUpdate> {
        let before = self.current.clone();
        f(&mut self.current);
        if self.current == before {
            None
        } else {
            Some(self.current.clone())
        }
    }
}

/// Leading "[token]" of a line, if present.
fn bracketed_token(line: &str) -> Option<&str> {
    if !line.starts_with('[') {
        return None;
    }
    let end = line.find(']')?;
    Some(&line[..=end])
}

/// Extracts the quoted path from `[Merger] Merging formats into "path"`.
fn merge_destination(line: &str) -> Option<String> {
    let rest = line.split("Merging formats into").nth(1)?;
    let start = rest.find('"')?;
    let rest = &rest[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_progress_line() {
        let mut parser = ProgressParser::new(".mp4");
        let update = parser
            .feed_line("[download]  50.0% of 10.00MiB at 1.5MiB/s ETA 00:10")
            .expect("progress line should report");
        assert_eq!(update.percent, 50.0);
        assert_eq!(update.speed, "1.5MiB/s");
        assert_eq!(update.eta, "00:10");
        assert_eq!(update.status, "[download]");
        assert_eq!(update.file_extension, ".mp4");
    }

    #[test]
    fn test_fields_stick_across_unrelated_lines() {
        let mut parser = ProgressParser::new(".mp4");
        parser
            .feed_line("[download]  50.0% of 10.00MiB at 1.5MiB/s ETA 00:10")
            .unwrap();

        // A line with no numeric content must not disturb the last known state.
        assert_eq!(parser.feed_line("WARNING: something harmless"), None);

        let update = parser
            .feed_line("[download]  55.0% of 10.00MiB at 1.5MiB/s ETA 00:09")
            .unwrap();
        assert_eq!(update.percent, 55.0);
        assert_eq!(update.speed, "1.5MiB/s");
        assert_eq!(update.eta, "00:09");
    }

    #[test]
    fn test_progress_line_without_speed_keeps_previous_speed() {
        let mut parser = ProgressParser::new(".mp4");
        parser
            .feed_line("[download]  50.0% of 10.00MiB at 1.5MiB/s ETA 00:10")
            .unwrap();
        let update = parser.feed_line("[download]  60.0% of 10.00MiB").unwrap();
        assert_eq!(update.percent, 60.0);
        assert_eq!(update.speed, "1.5MiB/s");
        assert_eq!(update.eta, "00:10");
    }

    #[test]
    fn test_destination_line() {
        let mut parser = ProgressParser::new(".mp4");
        let update = parser
            .feed_line("[download] Destination: /tmp/Some Video.mp4")
            .unwrap();
        assert_eq!(update.destination, "/tmp/Some Video.mp4");
        assert_eq!(update.status, "[download]");
    }

    #[test]
    fn test_phase_change_line() {
        let mut parser = ProgressParser::new(".mp4");
        parser
            .feed_line("[download]  99.0% of 10.00MiB at 1.5MiB/s ETA 00:00")
            .unwrap();
        let update = parser.feed_line("[Merger] Merging formats into \"/tmp/out.mp4\"").unwrap();
        assert_eq!(update.status, "[Merger]");
        assert_eq!(update.destination, "/tmp/out.mp4");
        // Percent is untouched by a phase line.
        assert_eq!(update.percent, 99.0);
    }

    #[test]
    fn test_repeated_phase_line_reports_once() {
        let mut parser = ProgressParser::new(".mp3");
        assert!(parser.feed_line("[ExtractAudio] Destination: /tmp/a.mp3").is_some());
        assert_eq!(parser.feed_line("[ExtractAudio] Destination: /tmp/a.mp3"), None);
    }

    #[test]
    fn test_garbage_and_partial_lines_are_dropped() {
        let mut parser = ProgressParser::new(".mp4");
        assert_eq!(parser.feed_line(""), None);
        assert_eq!(parser.feed_line("   "), None);
        assert_eq!(parser.feed_line("no brackets here"), None);
        assert_eq!(parser.feed_line("[download] nothing useful"), None);
        assert_eq!(parser.feed_line("[download] stuck at x% weird"), None);
    }

    #[test]
    fn test_percent_clamped_to_valid_range() {
        let mut parser = ProgressParser::new(".mp4");
        let update = parser.feed_line("[download]  150.0% of ~5MiB").unwrap();
        assert_eq!(update.percent, 100.0);
    }

    #[test]
    fn test_unknown_speed_token_ignored() {
        let mut parser = ProgressParser::new(".mp4");
        parser
            .feed_line("[download]  10.0% of 10.00MiB at 2.0MiB/s ETA 01:00")
            .unwrap();
        let update = parser
            .feed_line("[download]  11.0% of 10.00MiB at Unknown speed ETA Unknown")
            .unwrap();
        assert_eq!(update.speed, "2.0MiB/s");
        assert_eq!(update.eta, "01:00");
    }
}
