//! Message dispatch for the state machine.
//!
//! `App::update` is the only place application state changes. It consumes
//! one message, mutates the model, and optionally returns a [`Command`] for
//! the runtime to execute. It never blocks and never touches a subprocess
//! or the filesystem itself.

use crate::app::msg::{Command, FetchKind, Msg};
use crate::app::{App, FormatTab, LoadingKind, State};
use crate::core::types::{DownloadOptions, DownloadRequest, VideoItem};
use crate::download::queue::QueueRun;
use crate::download::unfinished::{UnfinishedDownload, UnfinishedVideo, QUEUE_MARKER_URL};
use crate::core::types::DownloadOutcome;
use crate::ytdlp::search::{build_video_url, classify_query, QueryKind};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

impl App {
    pub fn update(&mut self, msg: Msg) -> Option<Command> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Resize => None,
            Msg::Tick => {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                None
            }

            Msg::StartSearch { query } => self.submit_query(&query),

            Msg::ListingDone { videos, err } => {
                self.videos = videos;
                self.video_cursor = 0;
                self.marked.clear();
                self.err_msg = err;
                self.state = State::VideoList;
                None
            }

            Msg::StartFormats { url, video } => {
                self.state = State::Loading(LoadingKind::Formats);
                self.format_url = url.clone();
                self.selected_video = video;
                self.err_msg.clear();
                Some(Command::FetchFormats { url })
            }

            Msg::FormatsDone { formats, video, err } => {
                self.formats = formats;
                if !video.id.is_empty() {
                    self.selected_video = video;
                }
                self.format_tab = FormatTab::Video;
                self.format_cursor = 0;
                self.err_msg = err;
                self.state = State::FormatList;
                None
            }

            Msg::FetchCancelled { kind } => {
                match kind {
                    FetchKind::Search | FetchKind::Channel | FetchKind::Playlist => {
                        self.state = State::SearchInput;
                        self.err_msg = "Search cancelled".to_string();
                    }
                    FetchKind::Formats => {
                        self.state = if self.videos.is_empty() {
                            State::SearchInput
                        } else {
                            State::VideoList
                        };
                        self.err_msg.clear();
                    }
                }
                None
            }

            Msg::StartDownload(request) => self.start_download(request),

            Msg::StartQueue {
                videos,
                format_id,
                is_audio,
                abr,
            } => self.start_queue(videos, format_id, is_audio, abr),

            Msg::Progress(update) => {
                let dl = &mut self.download;
                // Percent never goes backwards within a session; a fresh
                // session starts from a reset state.
                if update.percent > dl.percent {
                    dl.percent = update.percent;
                }
                if !update.speed.is_empty() {
                    dl.speed = update.speed;
                }
                if !update.eta.is_empty() {
                    dl.eta = update.eta;
                }
                if !update.status.is_empty() {
                    dl.phase = update.status;
                }
                if !update.destination.is_empty() {
                    dl.destination = update.destination;
                }
                dl.file_extension = update.file_extension;
                None
            }

            Msg::DownloadFinished(outcome) => self.finish_download(outcome),

            Msg::DownloadPaused => {
                self.download.paused = true;
                None
            }
            Msg::DownloadResumed => {
                self.download.paused = false;
                None
            }
            Msg::DownloadCancelled => {
                self.download.cancelled = true;
                if let Some(queue) = self.download.queue.as_mut() {
                    queue.cancel_remaining();
                }
                None
            }

            Msg::UnfinishedLoaded(records) => {
                self.unfinished = records;
                None
            }

            Msg::PlayerStarted { video } => {
                self.playing = video;
                self.state = State::VideoPlaying;
                None
            }
            Msg::PlayerExited { error } => {
                self.err_msg = error;
                self.playing = VideoItem::default();
                self.state = if self.videos.is_empty() {
                    State::SearchInput
                } else {
                    State::VideoList
                };
                None
            }

            Msg::Quit => {
                self.should_quit = true;
                None
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }

        match self.state {
            State::SearchInput => self.key_search_input(key),
            State::Loading(kind) => self.key_loading(key, kind),
            State::VideoList => self.key_video_list(key),
            State::FormatList => self.key_format_list(key),
            State::Download => self.key_download(key),
            State::VideoPlaying => self.key_video_playing(key),
        }
    }

    fn key_search_input(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('u') {
                return self.resume_latest_unfinished();
            }
            return None;
        }
        match key.code {
            KeyCode::Char(c) => {
                self.query_input.push(c);
                self.err_msg.clear();
                None
            }
            KeyCode::Backspace => {
                self.query_input.pop();
                None
            }
            KeyCode::Enter => {
                let query = self.query_input.trim().to_string();
                if query.is_empty() {
                    return None;
                }
                self.query_input.clear();
                self.submit_query(&query)
            }
            _ => None,
        }
    }

    fn key_loading(&mut self, key: KeyEvent, kind: LoadingKind) -> Option<Command> {
        match key.code {
            KeyCode::Char('c') | KeyCode::Esc => {
                let kind = match kind {
                    LoadingKind::Search => FetchKind::Search,
                    LoadingKind::Channel => FetchKind::Channel,
                    LoadingKind::Playlist => FetchKind::Playlist,
                    LoadingKind::Formats => FetchKind::Formats,
                };
                Some(Command::CancelFetch { kind })
            }
            _ => None,
        }
    }

    fn key_video_list(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.video_cursor = self.video_cursor.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.video_cursor + 1 < self.videos.len() {
                    self.video_cursor += 1;
                }
                None
            }
            KeyCode::Char(' ') => {
                if !self.videos.is_empty() {
                    if !self.marked.remove(&self.video_cursor) {
                        self.marked.insert(self.video_cursor);
                    }
                }
                None
            }
            KeyCode::Enter => {
                let video = self.videos.get(self.video_cursor)?.clone();
                self.queue_videos = self
                    .marked
                    .iter()
                    .filter_map(|&i| self.videos.get(i).cloned())
                    .collect();
                self.update(Msg::StartFormats {
                    url: video.watch_url(),
                    video,
                })
            }
            KeyCode::Char('p') => {
                let video = self.videos.get(self.video_cursor)?.clone();
                Some(Command::Play {
                    url: video.watch_url(),
                    format: self.config.default_format.clone(),
                    video,
                })
            }
            KeyCode::Char('b') | KeyCode::Esc => {
                self.state = State::SearchInput;
                self.marked.clear();
                self.err_msg.clear();
                None
            }
            _ => None,
        }
    }

    fn key_format_list(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Tab => {
                self.format_tab = self.format_tab.next();
                self.format_cursor = 0;
                None
            }
            KeyCode::BackTab => {
                self.format_tab = self.format_tab.prev();
                self.format_cursor = 0;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.format_cursor = self.format_cursor.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.format_cursor + 1 < self.visible_formats().len() {
                    self.format_cursor += 1;
                }
                None
            }
            KeyCode::Enter => {
                let item = self.visible_formats().get(self.format_cursor)?.clone();
                let is_audio = self.format_tab == FormatTab::Audio;
                if self.queue_videos.is_empty() {
                    let request = DownloadRequest {
                        url: self.format_url.clone(),
                        format_id: item.format_id,
                        is_audio,
                        abr: item.abr,
                        title: self.selected_video.title.clone(),
                        options: self.download_options(),
                        cookies_browser: String::new(),
                        cookies_file: String::new(),
                    };
                    self.start_download(request)
                } else {
                    let videos = std::mem::take(&mut self.queue_videos);
                    self.start_queue(videos, item.format_id, is_audio, item.abr)
                }
            }
            KeyCode::Char('b') | KeyCode::Esc => {
                self.state = if self.videos.is_empty() {
                    State::SearchInput
                } else {
                    State::VideoList
                };
                self.err_msg.clear();
                None
            }
            _ => None,
        }
    }

    fn key_download(&mut self, key: KeyEvent) -> Option<Command> {
        // A queue paused on a failed item shows the decision screen; its
        // keys take priority over the normal download keys.
        let awaiting_decision = self
            .download
            .queue
            .as_ref()
            .map(|q| q.awaiting_decision())
            .unwrap_or(false);
        if awaiting_decision {
            return self.key_queue_decision(key);
        }

        match key.code {
            KeyCode::Char('p') => {
                if !self.download.completed && !self.download.cancelled {
                    Some(Command::PauseDownload)
                } else {
                    None
                }
            }
            KeyCode::Char('r') => {
                if !self.download.completed && !self.download.cancelled {
                    Some(Command::ResumeDownload)
                } else {
                    None
                }
            }
            KeyCode::Char('c') | KeyCode::Esc => {
                if !self.download.completed && !self.download.cancelled {
                    // Optimistic: flags flip now, teardown is asynchronous.
                    self.download.cancelled = true;
                    if let Some(queue) = self.download.queue.as_mut() {
                        queue.cancel_remaining();
                    }
                    Some(Command::CancelDownload)
                } else {
                    None
                }
            }
            KeyCode::Enter => {
                if self.download.completed {
                    self.leave_download_screen();
                }
                None
            }
            KeyCode::Char('b') => {
                if self.download.completed || self.download.cancelled {
                    self.state = State::FormatList;
                    self.err_msg.clear();
                }
                None
            }
            _ => None,
        }
    }

    fn key_queue_decision(&mut self, key: KeyEvent) -> Option<Command> {
        let queue = self.download.queue.as_mut()?;
        match key.code {
            KeyCode::Char('r') => {
                queue.retry_failed();
                let request = queue.begin_next()?;
                self.download.reset_session();
                self.download.video = VideoItem {
                    title: request.title.clone(),
                    ..Default::default()
                };
                Some(Command::StartDownload(request))
            }
            KeyCode::Char('s') => {
                queue.skip_failed();
                if let Some(request) = queue.begin_next() {
                    self.download.reset_session();
                    self.download.video = VideoItem {
                        title: request.title.clone(),
                        ..Default::default()
                    };
                    return Some(Command::StartDownload(request));
                }
                self.download.completed = true;
                Some(Command::ClearUnfinished {
                    url: QUEUE_MARKER_URL.to_string(),
                })
            }
            KeyCode::Char('c') | KeyCode::Esc => {
                queue.cancel_remaining();
                self.download.cancelled = true;
                None
            }
            _ => None,
        }
    }

    fn key_video_playing(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('x') | KeyCode::Esc => {
                self.playing = VideoItem::default();
                self.state = if self.videos.is_empty() {
                    State::SearchInput
                } else {
                    State::VideoList
                };
                Some(Command::StopPlayer)
            }
            _ => None,
        }
    }

    /// Routes a search-box entry by what it looks like.
    fn submit_query(&mut self, query: &str) -> Option<Command> {
        self.err_msg.clear();
        self.current_query = query.trim().to_string();
        match classify_query(query) {
            QueryKind::VideoUrl(id) => self.update(Msg::StartFormats {
                url: build_video_url(&id),
                video: VideoItem::default(),
            }),
            QueryKind::PlaylistUrl(_) => {
                self.state = State::Loading(LoadingKind::Playlist);
                Some(Command::PlaylistListing {
                    query: self.current_query.clone(),
                })
            }
            QueryKind::ChannelUrl(handle) => {
                self.state = State::Loading(LoadingKind::Channel);
                Some(Command::ChannelListing { name: handle })
            }
            QueryKind::Text => {
                self.state = State::Loading(LoadingKind::Search);
                Some(Command::Search {
                    query: self.current_query.clone(),
                })
            }
        }
    }

    /// Enters the download screen with a clean slate and hands the request
    /// to the controller.
    fn start_download(&mut self, request: DownloadRequest) -> Option<Command> {
        self.state = State::Download;
        self.download.reset_session();
        // A leftover queue from an earlier run must not capture this
        // session's terminal result.
        self.download.queue = None;
        self.download.video = if self.selected_video.id.is_empty() {
            VideoItem {
                title: request.title.clone(),
                ..Default::default()
            }
        } else {
            self.selected_video.clone()
        };
        Some(Command::StartDownload(request))
    }

    fn start_queue(&mut self, videos: Vec<VideoItem>, format_id: String, is_audio: bool, abr: f64) -> Option<Command> {
        let marker = UnfinishedDownload {
            url: QUEUE_MARKER_URL.to_string(),
            urls: videos.iter().map(|v| v.watch_url()).collect(),
            videos: videos
                .iter()
                .map(|v| UnfinishedVideo {
                    id: v.id.clone(),
                    title: v.title.clone(),
                })
                .collect(),
            format_id: format_id.clone(),
            title: format!("Queue of {} videos", videos.len()),
            description: self.current_query.clone(),
            timestamp: Utc::now(),
        };

        let mut queue = QueueRun::new(videos, format_id, is_audio, abr, self.download_options());
        let request = queue.begin_next()?;

        self.state = State::Download;
        self.download.reset_session();
        self.download.video = VideoItem {
            title: request.title.clone(),
            ..Default::default()
        };
        self.download.queue = Some(queue);

        Some(Command::Many(vec![
            Command::SaveUnfinished(marker),
            Command::StartDownload(request),
        ]))
    }

    /// Applies the single terminal result of a session.
    fn finish_download(&mut self, outcome: DownloadOutcome) -> Option<Command> {
        if self.download.queue.is_some() {
            return self.finish_queue_item(outcome);
        }

        match outcome {
            DownloadOutcome::Completed => {
                self.download.completed = true;
                None
            }
            DownloadOutcome::Cancelled => {
                self.download.cancelled = true;
                None
            }
            DownloadOutcome::Failed(error) => {
                // A cancelled session that still races an error report must
                // stay cancelled, not become a failure.
                if !self.download.cancelled {
                    self.err_msg = error;
                    self.state = State::SearchInput;
                }
                None
            }
        }
    }

    fn finish_queue_item(&mut self, outcome: DownloadOutcome) -> Option<Command> {
        let queue = self.download.queue.as_mut()?;
        match outcome {
            DownloadOutcome::Completed => {
                queue.finish_current(Ok(()));
                if let Some(request) = queue.begin_next() {
                    self.download.reset_session();
                    self.download.video = VideoItem {
                        title: request.title.clone(),
                        ..Default::default()
                    };
                    return Some(Command::StartDownload(request));
                }
                self.download.completed = true;
                Some(Command::ClearUnfinished {
                    url: QUEUE_MARKER_URL.to_string(),
                })
            }
            DownloadOutcome::Cancelled => {
                queue.cancel_remaining();
                self.download.cancelled = true;
                None
            }
            DownloadOutcome::Failed(error) => {
                queue.finish_current(Err(error));
                // Stay on the download screen; the decision keys take over.
                None
            }
        }
    }

    /// Re-issues the most recent interrupted download.
    fn resume_latest_unfinished(&mut self) -> Option<Command> {
        let record = self.unfinished.last().cloned()?;
        if record.url == QUEUE_MARKER_URL {
            let videos: Vec<VideoItem> = record
                .videos
                .iter()
                .map(|v| VideoItem {
                    id: v.id.clone(),
                    title: v.title.clone(),
                    ..Default::default()
                })
                .collect();
            if videos.is_empty() {
                return None;
            }
            return self.start_queue(videos, record.format_id, false, 0.0);
        }

        let format_id = if record.format_id.is_empty() {
            self.config.default_format.clone()
        } else {
            record.format_id
        };
        self.selected_video = VideoItem::default();
        self.start_download(DownloadRequest {
            url: record.url,
            format_id,
            is_audio: false,
            abr: 0.0,
            title: record.title,
            options: self.download_options(),
            cookies_browser: String::new(),
            cookies_file: String::new(),
        })
    }

    /// Success acknowledgement: back to a fresh search screen.
    fn leave_download_screen(&mut self) {
        self.state = State::SearchInput;
        self.query_input.clear();
        self.selected_video = VideoItem::default();
        self.download.reset_session();
        self.download.queue = None;
        self.download.video = VideoItem::default();
        self.err_msg.clear();
    }

    fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            embed_subtitles: self.config.embed_subtitles,
            embed_metadata: self.config.embed_metadata,
            embed_chapters: self.config.embed_chapters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::{FormatItem, FormatLists};
    use crate::download::progress::ProgressUpdate;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::new(Config::default())
    }

    fn key(code: KeyCode) -> Msg {
        Msg::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn videos(n: usize) -> Vec<VideoItem> {
        (0..n)
            .map(|i| VideoItem {
                id: format!("id{}", i),
                title: format!("Video {}", i),
                ..Default::default()
            })
            .collect()
    }

    fn progress(percent: f64) -> Msg {
        Msg::Progress(ProgressUpdate {
            percent,
            speed: "1.5MiB/s".to_string(),
            eta: "00:10".to_string(),
            status: "[download]".to_string(),
            destination: String::new(),
            file_extension: ".mp4".to_string(),
        })
    }

    #[test]
    fn test_text_search_enters_loading() {
        let mut app = app();
        let cmd = app.update(Msg::StartSearch {
            query: "rust tutorials".to_string(),
        });
        assert_eq!(app.state, State::Loading(LoadingKind::Search));
        assert_eq!(
            cmd,
            Some(Command::Search {
                query: "rust tutorials".to_string()
            })
        );
    }

    #[test]
    fn test_video_url_goes_straight_to_formats() {
        let mut app = app();
        let cmd = app.update(Msg::StartSearch {
            query: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        });
        assert_eq!(app.state, State::Loading(LoadingKind::Formats));
        assert_eq!(
            cmd,
            Some(Command::FetchFormats {
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()
            })
        );
    }

    #[test]
    fn test_listing_result_moves_to_video_list() {
        let mut app = app();
        app.update(Msg::StartSearch {
            query: "anything".to_string(),
        });
        let cmd = app.update(Msg::ListingDone {
            videos: videos(2),
            err: String::new(),
        });
        assert_eq!(cmd, None);
        assert_eq!(app.state, State::VideoList);
        assert_eq!(app.videos.len(), 2);
        assert_eq!(app.video_cursor, 0);
    }

    #[test]
    fn test_empty_error_from_listing_is_kept_verbatim() {
        let mut app = app();
        app.update(Msg::ListingDone {
            videos: Vec::new(),
            err: String::new(),
        });
        // Empty-but-present error: shown as nothing, but the state still
        // moved on. Distinct from a recognized message.
        assert_eq!(app.state, State::VideoList);
        assert_eq!(app.err_msg, "");
    }

    #[test]
    fn test_cancel_search_returns_to_input() {
        let mut app = app();
        app.update(Msg::StartSearch {
            query: "abc".to_string(),
        });
        let cmd = app.update(key(KeyCode::Esc));
        assert_eq!(
            cmd,
            Some(Command::CancelFetch {
                kind: FetchKind::Search
            })
        );
        app.update(Msg::FetchCancelled {
            kind: FetchKind::Search,
        });
        assert_eq!(app.state, State::SearchInput);
        assert_eq!(app.err_msg, "Search cancelled");
    }

    #[test]
    fn test_cancel_formats_returns_to_video_list() {
        let mut app = app();
        app.videos = videos(1);
        app.update(Msg::FetchCancelled {
            kind: FetchKind::Formats,
        });
        assert_eq!(app.state, State::VideoList);
        assert_eq!(app.err_msg, "");
    }

    #[test]
    fn test_start_download_resets_display_fields() {
        let mut app = app();
        // Dirty every display field as if a previous session ran.
        app.download.percent = 80.0;
        app.download.speed = "9MiB/s".to_string();
        app.download.eta = "00:01".to_string();
        app.download.phase = "[Merger]".to_string();
        app.download.destination = "/tmp/old.mp4".to_string();
        app.download.file_extension = ".mp3".to_string();
        app.download.paused = true;
        app.download.completed = true;
        app.download.cancelled = true;

        let request = DownloadRequest {
            url: "https://example.com/v".to_string(),
            format_id: "best".to_string(),
            title: "New".to_string(),
            ..Default::default()
        };
        let cmd = app.update(Msg::StartDownload(request.clone()));

        assert_eq!(app.state, State::Download);
        assert_eq!(cmd, Some(Command::StartDownload(request)));
        assert_eq!(app.download.percent, 0.0);
        assert_eq!(app.download.speed, "");
        assert_eq!(app.download.eta, "");
        assert_eq!(app.download.phase, "");
        assert_eq!(app.download.destination, "");
        assert_eq!(app.download.file_extension, "");
        assert!(!app.download.paused);
        assert!(!app.download.completed);
        assert!(!app.download.cancelled);
    }

    #[test]
    fn test_progress_updates_fields_without_changing_state() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        app.update(progress(42.0));
        assert_eq!(app.state, State::Download);
        assert_eq!(app.download.percent, 42.0);
        assert_eq!(app.download.speed, "1.5MiB/s");
        assert_eq!(app.download.eta, "00:10");
        assert_eq!(app.download.phase, "[download]");
    }

    #[test]
    fn test_progress_percent_is_monotonic() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        app.update(progress(50.0));
        app.update(progress(40.0));
        assert_eq!(app.download.percent, 50.0);
        app.update(progress(60.0));
        assert_eq!(app.download.percent, 60.0);
    }

    #[test]
    fn test_pause_resume_cycle_is_repeatable() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        for _ in 0..3 {
            let cmd = app.update(key(KeyCode::Char('p')));
            assert_eq!(cmd, Some(Command::PauseDownload));
            app.update(Msg::DownloadPaused);
            assert!(app.download.paused);

            let cmd = app.update(key(KeyCode::Char('r')));
            assert_eq!(cmd, Some(Command::ResumeDownload));
            app.update(Msg::DownloadResumed);
            assert!(!app.download.paused);
        }
        assert!(!app.download.completed);
        assert!(!app.download.cancelled);
    }

    #[test]
    fn test_cancel_is_optimistic_and_single_shot() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));

        let cmd = app.update(key(KeyCode::Char('c')));
        assert_eq!(cmd, Some(Command::CancelDownload));
        assert!(app.download.cancelled, "flag flips before teardown completes");

        // A second cancel keypress does nothing.
        assert_eq!(app.update(key(KeyCode::Char('c'))), None);

        // The session's own terminal message keeps the cancelled outcome.
        app.update(Msg::DownloadFinished(DownloadOutcome::Cancelled));
        assert!(app.download.cancelled);
        assert_eq!(app.state, State::Download);
    }

    #[test]
    fn test_failure_after_cancel_stays_cancelled() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        app.update(key(KeyCode::Char('c')));
        app.update(Msg::DownloadFinished(DownloadOutcome::Failed("boom".to_string())));
        assert_eq!(app.state, State::Download);
        assert!(app.download.cancelled);
        assert_eq!(app.err_msg, "");
    }

    #[test]
    fn test_single_download_failure_reports_and_returns_to_search() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        app.update(Msg::DownloadFinished(DownloadOutcome::Failed(
            "Download error: network".to_string(),
        )));
        assert_eq!(app.state, State::SearchInput);
        assert_eq!(app.err_msg, "Download error: network");
    }

    #[test]
    fn test_completed_download_waits_for_acknowledgement() {
        let mut app = app();
        app.update(Msg::StartDownload(DownloadRequest::default()));
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        assert_eq!(app.state, State::Download);
        assert!(app.download.completed);

        app.update(key(KeyCode::Enter));
        assert_eq!(app.state, State::SearchInput);
        assert_eq!(app.download.percent, 0.0);
        assert_eq!(app.download.speed, "");
    }

    #[test]
    fn test_queue_happy_path() {
        let mut app = app();
        let cmd = app.update(Msg::StartQueue {
            videos: videos(2),
            format_id: "best".to_string(),
            is_audio: false,
            abr: 0.0,
        });
        // Marker record saved, first item started.
        match cmd {
            Some(Command::Many(cmds)) => {
                assert!(matches!(cmds[0], Command::SaveUnfinished(_)));
                assert!(matches!(cmds[1], Command::StartDownload(_)));
            }
            other => panic!("expected Many, got {:?}", other),
        }
        assert_eq!(app.state, State::Download);

        // Item 1 done -> item 2 starts.
        let cmd = app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        assert!(matches!(cmd, Some(Command::StartDownload(_))));
        assert!(!app.download.completed);

        // Item 2 done -> queue finished, marker cleared.
        let cmd = app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        assert_eq!(
            cmd,
            Some(Command::ClearUnfinished {
                url: QUEUE_MARKER_URL.to_string()
            })
        );
        assert!(app.download.completed);
        let summary = app.download.queue.as_ref().unwrap().summary();
        assert_eq!((summary.complete, summary.error, summary.skipped), (2, 0, 0));
    }

    #[test]
    fn test_queue_failure_skip_scenario() {
        // Three items; item 2 fails with "network down"; the user skips.
        let mut app = app();
        app.update(Msg::StartQueue {
            videos: videos(3),
            format_id: "best".to_string(),
            is_audio: false,
            abr: 0.0,
        });
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        app.update(Msg::DownloadFinished(DownloadOutcome::Failed(
            "network down".to_string(),
        )));
        // Queue pauses on the error, awaiting a decision.
        assert_eq!(app.state, State::Download);
        assert!(app.download.queue.as_ref().unwrap().awaiting_decision());
        assert_eq!(
            app.download.queue.as_ref().unwrap().blocking_error(),
            Some("network down")
        );

        // Skip -> item 3 starts; item 3 succeeds.
        let cmd = app.update(key(KeyCode::Char('s')));
        assert!(matches!(cmd, Some(Command::StartDownload(_))));
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));

        let summary = app.download.queue.as_ref().unwrap().summary();
        assert_eq!((summary.complete, summary.error, summary.skipped), (2, 0, 1));
        assert!(app.download.completed);
    }

    #[test]
    fn test_queue_failure_retry_scenario() {
        let mut app = app();
        app.update(Msg::StartQueue {
            videos: videos(2),
            format_id: "best".to_string(),
            is_audio: false,
            abr: 0.0,
        });
        app.update(Msg::DownloadFinished(DownloadOutcome::Failed("flaky".to_string())));

        let cmd = app.update(key(KeyCode::Char('r')));
        match cmd {
            Some(Command::StartDownload(req)) => assert!(req.url.contains("id0")),
            other => panic!("expected retry of the same item, got {:?}", other),
        }
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));
        let summary = app.download.queue.as_ref().unwrap().summary();
        assert_eq!((summary.complete, summary.error, summary.skipped), (2, 0, 0));
    }

    #[test]
    fn test_queue_cancel_mid_run() {
        // 1 complete, 1 in flight, 2 pending -> cancel.
        let mut app = app();
        app.update(Msg::StartQueue {
            videos: videos(4),
            format_id: "best".to_string(),
            is_audio: false,
            abr: 0.0,
        });
        app.update(Msg::DownloadFinished(DownloadOutcome::Completed));

        let cmd = app.update(key(KeyCode::Esc));
        assert_eq!(cmd, Some(Command::CancelDownload));
        app.update(Msg::DownloadFinished(DownloadOutcome::Cancelled));

        let queue = app.download.queue.as_ref().unwrap();
        assert!(queue.cancelled);
        let summary = queue.summary();
        assert_eq!((summary.complete, summary.error, summary.skipped), (1, 0, 3));
        assert!(app.download.cancelled);
    }

    #[test]
    fn test_queue_decision_cancel_skips_remainder() {
        let mut app = app();
        app.update(Msg::StartQueue {
            videos: videos(3),
            format_id: "best".to_string(),
            is_audio: false,
            abr: 0.0,
        });
        app.update(Msg::DownloadFinished(DownloadOutcome::Failed("boom".to_string())));

        let cmd = app.update(key(KeyCode::Char('c')));
        assert_eq!(cmd, None, "no session is running while the queue awaits a decision");
        let queue = app.download.queue.as_ref().unwrap();
        assert!(queue.cancelled);
        let summary = queue.summary();
        assert_eq!(summary.complete + summary.error + summary.skipped, 3);
    }

    #[test]
    fn test_video_list_marking_and_queue_start() {
        let mut app = app();
        app.update(Msg::ListingDone {
            videos: videos(3),
            err: String::new(),
        });
        app.update(key(KeyCode::Char(' ')));
        app.update(key(KeyCode::Down));
        app.update(key(KeyCode::Char(' ')));
        assert_eq!(app.marked.len(), 2);

        // Enter fetches formats for the cursor video and remembers the batch.
        let cmd = app.update(key(KeyCode::Enter));
        assert!(matches!(cmd, Some(Command::FetchFormats { .. })));
        assert_eq!(app.queue_videos.len(), 2);

        // Choosing a format starts the queue over the batch.
        app.update(Msg::FormatsDone {
            formats: FormatLists {
                video: vec![FormatItem {
                    format_id: "22".to_string(),
                    title: "720p mp4".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            video: VideoItem::default(),
            err: String::new(),
        });
        let cmd = app.update(key(KeyCode::Enter));
        assert!(matches!(cmd, Some(Command::Many(_))));
        assert_eq!(app.download.queue.as_ref().unwrap().total(), 2);
    }

    #[test]
    fn test_format_selection_single_download() {
        let mut app = app();
        app.selected_video = VideoItem {
            id: "abc".to_string(),
            title: "Picked".to_string(),
            ..Default::default()
        };
        app.format_url = "https://www.youtube.com/watch?v=abc".to_string();
        app.state = State::FormatList;
        app.formats = FormatLists {
            video: vec![FormatItem {
                format_id: "137+140".to_string(),
                ..Default::default()
            }],
            audio: vec![FormatItem {
                format_id: "140".to_string(),
                abr: 128.0,
                ..Default::default()
            }],
            ..Default::default()
        };

        let cmd = app.update(key(KeyCode::Enter));
        match cmd {
            Some(Command::StartDownload(req)) => {
                assert_eq!(req.format_id, "137+140");
                assert!(!req.is_audio);
                assert_eq!(req.title, "Picked");
            }
            other => panic!("expected StartDownload, got {:?}", other),
        }
    }

    #[test]
    fn test_audio_tab_selection_carries_bitrate() {
        let mut app = app();
        app.state = State::FormatList;
        app.format_url = "https://www.youtube.com/watch?v=abc".to_string();
        app.formats = FormatLists {
            audio: vec![FormatItem {
                format_id: "140".to_string(),
                abr: 128.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        app.update(key(KeyCode::Tab));
        assert_eq!(app.format_tab, FormatTab::Audio);

        let cmd = app.update(key(KeyCode::Enter));
        match cmd {
            Some(Command::StartDownload(req)) => {
                assert!(req.is_audio);
                assert_eq!(req.abr, 128.0);
            }
            other => panic!("expected StartDownload, got {:?}", other),
        }
    }

    #[test]
    fn test_resume_latest_unfinished_single() {
        let mut app = app();
        app.unfinished = vec![UnfinishedDownload {
            url: "https://example.com/v".to_string(),
            urls: Vec::new(),
            videos: Vec::new(),
            format_id: "best".to_string(),
            title: "Interrupted".to_string(),
            description: String::new(),
            timestamp: Utc::now(),
        }];

        let cmd = app.update(Msg::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
        match cmd {
            Some(Command::StartDownload(req)) => {
                assert_eq!(req.url, "https://example.com/v");
                assert_eq!(req.format_id, "best");
                assert_eq!(req.title, "Interrupted");
            }
            other => panic!("expected StartDownload, got {:?}", other),
        }
        assert_eq!(app.state, State::Download);
    }

    #[test]
    fn test_resume_queue_marker_rebuilds_queue() {
        let mut app = app();
        app.unfinished = vec![UnfinishedDownload {
            url: QUEUE_MARKER_URL.to_string(),
            urls: Vec::new(),
            videos: vec![
                UnfinishedVideo {
                    id: "a".to_string(),
                    title: "A".to_string(),
                },
                UnfinishedVideo {
                    id: "b".to_string(),
                    title: "B".to_string(),
                },
            ],
            format_id: "best".to_string(),
            title: "Queue of 2 videos".to_string(),
            description: String::new(),
            timestamp: Utc::now(),
        }];

        let cmd = app.update(Msg::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
        assert!(matches!(cmd, Some(Command::Many(_))));
        assert_eq!(app.download.queue.as_ref().unwrap().total(), 2);
    }

    #[test]
    fn test_player_roundtrip() {
        let mut app = app();
        app.update(Msg::ListingDone {
            videos: videos(1),
            err: String::new(),
        });
        let cmd = app.update(key(KeyCode::Char('p')));
        assert!(matches!(cmd, Some(Command::Play { .. })));

        app.update(Msg::PlayerStarted {
            video: app.videos[0].clone(),
        });
        assert_eq!(app.state, State::VideoPlaying);

        app.update(Msg::PlayerExited { error: String::new() });
        assert_eq!(app.state, State::VideoList);
    }

    #[test]
    fn test_stop_player_returns_immediately() {
        let mut app = app();
        app.videos = videos(1);
        app.state = State::VideoPlaying;
        let cmd = app.update(key(KeyCode::Char('x')));
        assert_eq!(cmd, Some(Command::StopPlayer));
        assert_eq!(app.state, State::VideoList);
    }

    #[test]
    fn test_ctrl_c_quits_from_any_state() {
        for state in [State::SearchInput, State::VideoList, State::Download] {
            let mut app = app();
            app.state = state;
            app.update(Msg::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
            assert!(app.should_quit);
        }
    }

    #[test]
    fn test_typing_builds_query() {
        let mut app = app();
        for c in "cats".chars() {
            app.update(key(KeyCode::Char(c)));
        }
        app.update(key(KeyCode::Backspace));
        assert_eq!(app.query_input, "cat");
    }
}
