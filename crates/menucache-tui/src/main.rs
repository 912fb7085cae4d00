//! menucache - a keyboard-driven restaurant menu that keeps working offline.
//!
//! The menu and its assets are fetched through a cache-first gateway, so a
//! menu that loaded once keeps loading with the network gone. Orders are
//! handed off as a WhatsApp deep link.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use menucache_core::catalog::CatalogStore;
use menucache_core::config::Config;
use menucache_core::gateway::{CacheStorage, Registration};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written while the alternate screen is active
const LOG_FILE: &str = "menucache.log";

/// Initialize the tracing subscriber for logging.
///
/// With a log directory, output goes to a file so it does not tear the
/// terminal UI; otherwise to stderr. Use RUST_LOG to control the level.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--print-menu" {
        init_tracing(None);
        return print_menu(config).await;
    }
    if args.len() > 1 && args[1] == "--clear-cache" {
        init_tracing(None);
        return clear_cache(&config);
    }

    // Initialize logging
    let log_dir = config.cache_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let _log_guard = init_tracing(Some(&log_dir));
    info!("menucache starting");
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    // Create app before touching the terminal so setup errors print cleanly
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    // The deep link is only useful outside the alternate screen
    if let Some(ref submission) = app.submission {
        println!("Open this link to send your order on WhatsApp:");
        println!("{}", submission.deep_link);
    }

    info!("menucache shutting down");
    Ok(())
}

/// Install the cache, load the menu through it and print it as JSON
async fn print_menu(config: Config) -> Result<()> {
    let gateway = app::build_gateway(&config, config.cache_dir()?)?;

    let mut registration = Registration::new();
    let report = registration.update(Arc::clone(&gateway)).await?;
    for (asset, reason) in &report.failed {
        eprintln!("Warning: could not cache {}: {}", asset, reason);
    }

    // A generation left waiting is not serving yet
    let serving = registration.controller().unwrap_or_else(|| Arc::clone(&gateway));

    let mut store = CatalogStore::new();
    let count = store.load(&*serving, &config.menu_url()?).await?;

    let json = serde_json::to_string_pretty(store.items())?;
    println!("{}", json);

    eprintln!(
        "{} items, {} specials (cache {})",
        count,
        store.select_specials(config.specials_limit).len(),
        serving.generation()
    );
    Ok(())
}

/// Delete every named cache
fn clear_cache(config: &Config) -> Result<()> {
    let storage = CacheStorage::new(config.cache_dir()?)?;
    let names = storage.keys()?;
    if names.is_empty() {
        eprintln!("No caches to delete");
    }
    for name in names {
        storage.delete(&name)?;
        eprintln!("Deleted cache {}", name);
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
