#![deny(unsafe_code)]

//! pillbox TUI: edit a prompt as text and as tags side by side.

mod app;
mod keymap;
mod panels;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    ExecutableCommand,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use pillbox_config::AppConfig;
use pillbox_core::menu::Point;
use pillbox_core::{AssetApi, NotificationLayer, notify};

use app::{App, Delivery};

/// Longest wait for input when no debounce is pending.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Puts the terminal back however the loop exits.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        io::stdout().execute(EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = io::stdout().execute(DisableMouseCapture);
        let _ = io::stdout().execute(LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // pillbox-tui [CONFIG] [PROMPT]
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pillbox.toml"));
    let initial_prompt = args.next();
    let (config, load_error) = load_config(&config_path).await;

    // The terminal belongs to the UI; events only reach the status line.
    let notifications = NotificationLayer::from_config(&config.logging);
    let reader = notifications.reader();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(notifications)
        .init();
    if let Some(err) = load_error {
        notify::report(Level::WARN, &format!("using default configuration: {err}"));
    }

    let api = AssetApi::from_config(&config.server).context("invalid [server] configuration")?;
    info!(base_url = %api.base_url(), "Starting pillbox TUI");

    let mut app = App::new(&config, reader);
    if let Some(text) = initial_prompt {
        app = app.with_prompt(&text);
    }
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    while !app.should_quit {
        let now = Instant::now();
        app.tick(now);
        while let Ok(delivery) = rx.try_recv() {
            app.deliver(delivery);
        }
        spawn_jobs(&mut app, &api, &tx);

        terminal.draw(|frame| panels::draw(frame, &mut app, now))?;

        let timeout = app
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL)
            .min(IDLE_POLL);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(input) = keymap::to_input(key) {
                        app.handle_key(input, Instant::now());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                _ => {}
            }
        }
    }

    Ok(())
}

fn spawn_jobs(app: &mut App, api: &AssetApi, tx: &mpsc::UnboundedSender<Delivery>) {
    for job in app.take_jobs() {
        let api = api.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let delivery = job.run(&api).await;
            // The receiver is gone only after the loop has exited.
            let _ = tx.send(delivery);
        });
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let point = Point::new(i32::from(mouse.column), i32::from(mouse.row));
    let modifiers = keymap::to_modifiers(mouse.modifiers);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(point, modifiers),
        MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(point, modifiers),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(),
        MouseEventKind::Moved => app.mouse_move(point),
        _ => {}
    }
}

/// Load the config, falling back to defaults. A load failure is returned
/// so it can be shown once logging is up.
async fn load_config(path: &Path) -> (AppConfig, Option<String>) {
    if !path.exists() {
        return (AppConfig::default(), None);
    }
    match AppConfig::load(path).await {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err.to_string())),
    }
}
