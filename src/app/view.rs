//! Rendering. Deliberately plain — the interesting machinery lives in the
//! state machine and the download engine, the view just mirrors the model.

use crate::app::{App, FormatTab, LoadingKind, State};
use crate::download::queue::QueueStatus;
use crate::ytdlp::search::{format_duration, format_views};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    match app.state {
        State::SearchInput => draw_search(frame, app, chunks[0]),
        State::Loading(kind) => draw_loading(frame, app, kind, chunks[0]),
        State::VideoList => draw_video_list(frame, app, chunks[0]),
        State::FormatList => draw_format_list(frame, app, chunks[0]),
        State::Download => draw_download(frame, app, chunks[0]),
        State::VideoPlaying => draw_playing(frame, app, chunks[0]),
    }

    draw_status_bar(frame, app, chunks[1]);
}

fn draw_search(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled("tubetui", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(format!("Search: {}_", app.query_input)),
        Line::from(""),
        Line::from(Span::styled(
            "Enter a search, a video/playlist/channel URL, or a @handle",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if !app.unfinished.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} unfinished download(s) — ctrl+u resumes the latest", app.unfinished.len()),
            Style::default().fg(Color::Yellow),
        )));
        for record in app.unfinished.iter().rev().take(5) {
            lines.push(Line::from(Span::styled(
                format!("  • {}", record.title),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_loading(frame: &mut Frame, app: &App, kind: LoadingKind, area: Rect) {
    let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
    let label = match kind {
        LoadingKind::Search => format!("Searching for \"{}\"", app.current_query),
        LoadingKind::Channel => "Loading channel videos...".to_string(),
        LoadingKind::Playlist => "Loading playlist...".to_string(),
        LoadingKind::Formats => "Fetching formats...".to_string(),
    };
    frame.render_widget(
        Paragraph::new(format!("\n{} {}", spinner, label)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_video_list(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .videos
        .iter()
        .enumerate()
        .map(|(i, video)| {
            let mark = if app.marked.contains(&i) { "[x] " } else { "    " };
            let meta = format!(
                "  {} · {} views · {}",
                video.channel,
                format_views(video.views),
                format_duration(video.duration)
            );
            ListItem::new(vec![
                Line::from(format!("{}{}", mark, video.title)),
                Line::from(Span::styled(meta, Style::default().fg(Color::DarkGray))),
            ])
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.video_cursor));
    frame.render_stateful_widget(
        List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Results"))
            .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        area,
        &mut state,
    );
}

fn draw_format_list(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(area);

    let tabs: Vec<Span> = [FormatTab::Video, FormatTab::Audio, FormatTab::Thumbnail]
        .iter()
        .map(|tab| {
            let style = if *tab == app.format_tab {
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!(" {} ", tab.label()), style)
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(tabs)), chunks[0]);

    let items: Vec<ListItem> = app
        .visible_formats()
        .iter()
        .map(|format| {
            let size = if format.size.is_empty() {
                String::new()
            } else {
                format!("  ({})", format.size)
            };
            ListItem::new(format!("{}{}", format.title, size))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.format_cursor));
    let title = if app.selected_video.title.is_empty() {
        "Select a format".to_string()
    } else {
        format!("Select a format — {}", app.selected_video.title)
    };
    frame.render_stateful_widget(
        List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        chunks[1],
        &mut state,
    );
}

fn draw_download(frame: &mut Frame, app: &App, area: Rect) {
    let dl = &app.download;

    if let Some(queue) = &dl.queue {
        if queue.awaiting_decision() {
            draw_queue_error(frame, app, area);
            return;
        }
    }

    let mut lines = vec![Line::from(Span::styled(
        dl.video.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];

    if let Some(queue) = &dl.queue {
        let summary = queue.summary();
        let header = if queue.cancelled {
            format!(
                "Queue cancelled: {} complete | {} failed | {} skipped",
                summary.complete, summary.error, summary.skipped
            )
        } else if dl.completed {
            format!(
                "Queue summary: {} complete | {} failed | {} skipped",
                summary.complete, summary.error, summary.skipped
            )
        } else {
            format!("Queue: video {}/{}", queue.current_index(), queue.total())
        };
        lines.push(Line::from(header));
        for item in queue.items() {
            let (symbol, color) = match item.status {
                QueueStatus::Pending => ("·", Color::DarkGray),
                QueueStatus::Downloading => ("↓", Color::Magenta),
                QueueStatus::Complete => ("✓", Color::Green),
                QueueStatus::Error => ("✗", Color::Red),
                QueueStatus::Skipped => ("-", Color::Yellow),
            };
            lines.push(Line::from(Span::styled(
                format!("  {} {}. {}", symbol, item.index, item.video.title),
                Style::default().fg(color),
            )));
        }
        lines.push(Line::from(""));
    }

    let status = if dl.cancelled {
        Span::styled("Cancelled", Style::default().fg(Color::Red))
    } else if dl.completed {
        Span::styled("Download complete", Style::default().fg(Color::Green))
    } else if dl.paused {
        Span::styled("Paused", Style::default().fg(Color::Yellow))
    } else if dl.phase.is_empty() {
        // No subprocess output yet
        let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        Span::styled(format!("{} Starting download...", spinner), Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            format!("{} {}", dl.phase, dl.speed),
            Style::default().fg(Color::DarkGray),
        )
    };
    lines.push(Line::from(status));
    if !dl.eta.is_empty() && !dl.completed && !dl.cancelled {
        lines.push(Line::from(format!("ETA {}", dl.eta)));
    }
    if !dl.destination.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("→ {}", dl.destination),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Download")),
        chunks[0],
    );
    frame.render_widget(
        Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Magenta))
            .ratio((dl.percent / 100.0).clamp(0.0, 1.0)),
        chunks[1],
    );
}

fn draw_queue_error(frame: &mut Frame, app: &App, area: Rect) {
    let queue = match &app.download.queue {
        Some(queue) => queue,
        None => return,
    };
    let error = queue.blocking_error().unwrap_or("unknown error");
    let lines = vec![
        Line::from(Span::styled(
            format!("Video {}/{} failed", queue.current_index(), queue.total()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(error.to_string()),
        Line::from(""),
        Line::from("[r] Retry this video"),
        Line::from("[s] Skip and continue"),
        Line::from("[c/esc] Cancel queue"),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Queue error")),
        area,
    );
}

fn draw_playing(frame: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(Span::styled("Now Playing", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(app.playing.title.clone()),
        Line::from(Span::styled(
            format!(
                "{} · {} views · {}",
                app.playing.channel,
                format_views(app.playing.views),
                format_duration(app.playing.duration)
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from("[x/esc] Stop playback"),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let keys = match app.state {
        State::SearchInput => "enter: search · ctrl+u: resume · ctrl+c: quit",
        State::Loading(_) => "c/esc: cancel · ctrl+c: quit",
        State::VideoList => "enter: formats · space: mark · p: play · b: back · ctrl+c: quit",
        State::FormatList => "enter: download · tab: switch tab · b: back · ctrl+c: quit",
        State::Download => "p: pause · r: resume · c: cancel · b: back · ctrl+c: quit",
        State::VideoPlaying => "x: stop · ctrl+c: quit",
    };
    let mut spans = vec![Span::raw(keys)];
    if !app.err_msg.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(app.err_msg.clone(), Style::default().fg(Color::Red)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
