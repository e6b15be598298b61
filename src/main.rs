use anyhow::Context;
use clap::Parser;
use crossterm::event::Event;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

use tubetui::app::msg::{Command, Msg};
use tubetui::app::{view, App};
use tubetui::core::config::{data_dir, Config};
use tubetui::core::logging::init_logger;
use tubetui::download::{DownloadController, SessionEvent, UnfinishedStore};
use tubetui::player::{PlayerEvent, PlayerManager};
use tubetui::ytdlp::search::{build_channel_url, build_playlist_url, build_search_url};
use tubetui::ytdlp::{formats, search, Fetcher};

#[derive(Parser, Debug)]
#[command(name = "tubetui", version, about = "Search, download and play videos from the terminal")]
struct Cli {
    /// Search query or video/playlist/channel URL to open on startup
    query: Option<String>,

    /// List a channel's uploads on startup
    #[arg(long)]
    channel: Option<String>,

    /// List a playlist on startup
    #[arg(long)]
    playlist: Option<String>,

    /// Alternate config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Shared handles the command executor works with.
struct Runtime {
    tx: UnboundedSender<Msg>,
    config: Config,
    controller: Arc<DownloadController>,
    fetcher: Arc<Fetcher>,
    player: Arc<PlayerManager>,
    store: Arc<UnfinishedStore>,
    session_tx: UnboundedSender<SessionEvent>,
    player_tx: UnboundedSender<PlayerEvent>,
}

impl Runtime {
    /// Executes one deferred command. Anything that could block runs on its
    /// own task and reports back through the message inbox.
    fn execute(&self, command: Command) {
        match command {
            Command::Many(commands) => {
                for command in commands {
                    self.execute(command);
                }
            }

            Command::Search { query } => {
                self.listing(build_search_url(&query, &self.config.sort_by));
            }
            Command::ChannelListing { name } => {
                self.listing(build_channel_url(&name));
            }
            Command::PlaylistListing { query } => {
                self.listing(build_playlist_url(&query));
            }

            Command::FetchFormats { url } => {
                let tx = self.tx.clone();
                let fetcher = Arc::clone(&self.fetcher);
                let config = self.config.clone();
                tokio::spawn(async move {
                    if let Some((formats, video, err)) = formats::fetch_formats(&fetcher, &config, &url).await {
                        let _ = tx.send(Msg::FormatsDone { formats, video, err });
                    }
                });
            }

            Command::CancelFetch { kind } => {
                self.fetcher.cancel();
                let _ = self.tx.send(Msg::FetchCancelled { kind });
            }

            Command::StartDownload(request) => {
                Arc::clone(&self.controller).start(request, &self.config, self.session_tx.clone());
            }
            Command::PauseDownload => {
                // On platforms without suspension the flag still flips; the
                // subprocess just keeps running.
                if !self.controller.supports_suspend() {
                    log::info!("Process suspension unsupported here; pause is display-only");
                }
                self.controller.pause();
                let _ = self.tx.send(Msg::DownloadPaused);
            }
            Command::ResumeDownload => {
                self.controller.resume();
                let _ = self.tx.send(Msg::DownloadResumed);
            }
            Command::CancelDownload => {
                self.controller.cancel();
                let _ = self.tx.send(Msg::DownloadCancelled);
            }

            Command::SaveUnfinished(record) => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    store.add(record).await;
                });
            }
            Command::ClearUnfinished { url } => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    store.remove(&url).await;
                });
            }
            Command::LoadUnfinished => {
                let store = Arc::clone(&self.store);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let records = store.load().await;
                    let _ = tx.send(Msg::UnfinishedLoaded(records));
                });
            }

            Command::Play { url, format, video } => {
                Arc::clone(&self.player).play(&self.config, &url, &format, video, self.player_tx.clone());
            }
            Command::StopPlayer => {
                self.player.kill();
            }
        }
    }

    fn listing(&self, url: String) {
        let tx = self.tx.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let config = self.config.clone();
        tokio::spawn(async move {
            // A cancelled run yields None: the cancel path already reported.
            if let Some((videos, err)) = search::run_listing(&fetcher, &config, &url).await {
                let _ = tx.send(Msg::ListingDone { videos, err });
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logger(&data_dir().join("tubetui.log")).context("failed to initialize logging")?;
    log::info!("tubetui {} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let (tx, rx) = mpsc::unbounded_channel::<Msg>();

    let store = Arc::new(UnfinishedStore::default_location());
    let runtime = Runtime {
        tx: tx.clone(),
        config: config.clone(),
        controller: Arc::new(DownloadController::new(Arc::clone(&store))),
        fetcher: Arc::new(Fetcher::new()),
        player: Arc::new(PlayerManager::new()),
        store,
        session_tx: spawn_session_forwarder(tx.clone()),
        player_tx: spawn_player_forwarder(tx.clone()),
    };

    spawn_input_thread(tx.clone());
    spawn_ticker(tx.clone());

    // Recover interrupted downloads, then honor the startup flags
    // (query wins over --channel, --channel over --playlist).
    runtime.execute(Command::LoadUnfinished);
    if let Some(query) = cli.query {
        let _ = tx.send(Msg::StartSearch { query });
    } else if let Some(channel) = cli.channel {
        let _ = tx.send(Msg::StartSearch { query: build_channel_url(&channel) });
    } else if let Some(playlist) = cli.playlist {
        let _ = tx.send(Msg::StartSearch { query: build_playlist_url(&playlist) });
    }

    enable_raw_mode().context("failed to enter raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("failed to create terminal")?;

    let result = run_loop(&mut terminal, App::new(config), rx, &runtime).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    log::info!("tubetui exiting");
    result
}

/// The event loop: the only place application state is touched.
async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut rx: mpsc::UnboundedReceiver<Msg>,
    runtime: &Runtime,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| view::draw(frame, &app))?;

        let Some(msg) = rx.recv().await else {
            return Ok(());
        };
        if let Some(command) = app.update(msg) {
            runtime.execute(command);
        }
        // Drain whatever else is queued before the next draw.
        while let Ok(msg) = rx.try_recv() {
            if let Some(command) = app.update(msg) {
                runtime.execute(command);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Maps download session events into the shared inbox.
fn spawn_session_forwarder(tx: UnboundedSender<Msg>) -> UnboundedSender<SessionEvent> {
    let (session_tx, mut session_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = session_rx.recv().await {
            let msg = match event {
                SessionEvent::Progress(update) => Msg::Progress(update),
                SessionEvent::Finished(outcome) => Msg::DownloadFinished(outcome),
            };
            if tx.send(msg).is_err() {
                break;
            }
        }
    });
    session_tx
}

/// Maps player events into the shared inbox.
fn spawn_player_forwarder(tx: UnboundedSender<Msg>) -> UnboundedSender<PlayerEvent> {
    let (player_tx, mut player_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = player_rx.recv().await {
            let msg = match event {
                PlayerEvent::Started { video } => Msg::PlayerStarted { video },
                PlayerEvent::Exited { error } => Msg::PlayerExited { error },
            };
            if tx.send(msg).is_err() {
                break;
            }
        }
    });
    player_tx
}

/// Terminal input runs on a plain thread; crossterm's blocking read must not
/// occupy a runtime worker.
fn spawn_input_thread(tx: UnboundedSender<Msg>) {
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(Event::Key(key)) => {
                if tx.send(Msg::Key(key)).is_err() {
                    break;
                }
            }
            Ok(Event::Resize(_, _)) => {
                if tx.send(Msg::Resize).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("Input read failed: {}", e);
                break;
            }
        }
    });
}

/// Spinner heartbeat.
fn spawn_ticker(tx: UnboundedSender<Msg>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(200));
        loop {
            interval.tick().await;
            if tx.send(Msg::Tick).is_err() {
                break;
            }
        }
    });
}
