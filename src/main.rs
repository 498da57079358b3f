mod config;
mod gcal;
mod portal;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use termsync_core::{CalendarSink, SyncError, SyncWindow, WindowSyncEngine, parse_feed};

#[derive(Parser)]
#[command(name = "termsync")]
#[command(about = "Mirror a staff-portal schedule into Google Calendar, replacing a rolling window of months")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Google Calendar
    Auth,
    /// Replace the sync window with the portal's current schedule
    Sync {
        /// Read the schedule from a local ICS file instead of the portal
        #[arg(long)]
        feed_file: Option<PathBuf>,

        /// Show what would change without touching the calendar
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => auth().await,
        Commands::Sync { feed_file, dry_run } => sync(feed_file, dry_run).await,
    }
}

async fn auth() -> Result<()> {
    let config = config::load_config()?;
    let tokens = gcal::authenticate(&config.google).await?;
    config::save_tokens(&tokens)?;
    println!("{}", "Tokens saved.".green());
    Ok(())
}

async fn sync(feed_file: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let config = config::load_config()?;

    let tokens = config::load_tokens()?
        .context("Not authenticated with Google Calendar. Run `termsync auth` first.")?;
    let tokens = gcal::ensure_fresh_tokens(&config.google, tokens).await?;
    config::save_tokens(&tokens)?;

    let feed = match &feed_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feed file {}", path.display()))?,
        None => {
            println!("Downloading schedule from {}...", config.portal.base_url);
            let feed = portal::fetch_schedule(&config.portal).await?;
            println!("Downloaded.");
            feed
        }
    };

    let now = Local::now();
    let window = SyncWindow::compute(&now, config.google.sync_months)?;
    println!(
        "Sync window: {} .. {}",
        window.start_rfc3339().bold(),
        window.end_rfc3339().bold()
    );

    let sink = gcal::GoogleCalendarSink::new(&config.google, &tokens);

    if dry_run {
        return preview(&window, &sink, &feed).await;
    }

    let engine = WindowSyncEngine::new(sink);

    println!("{}", "Delete events:".bold());
    let deleted = engine.purge(&window).await?;

    let entries = parse_feed(&feed)?;

    println!("{}", "Insert events:".bold());
    let (inserted, skipped) = engine.reconcile(&window, &entries).await?;

    println!(
        "\nDone: {} deleted, {} inserted, {} outside the window",
        deleted.to_string().green(),
        inserted.to_string().green(),
        skipped
    );

    Ok(())
}

/// List what a real run would delete and insert, without mutating anything.
async fn preview<S: CalendarSink>(window: &SyncWindow, sink: &S, feed: &str) -> Result<()> {
    let existing = sink.list_events(window).await.map_err(SyncError::List)?;

    println!("Would delete {} events:", existing.len());
    for event in &existing {
        println!("  del {} {}", event.id, event.summary);
    }

    let entries = parse_feed(feed)?;
    let (inside, outside): (Vec<_>, Vec<_>) =
        entries.iter().partition(|e| window.contains(&e.start));

    println!(
        "Would insert {} entries ({} outside the window):",
        inside.len(),
        outside.len()
    );
    for entry in inside {
        println!("  new {} {}", entry.start.to_rfc3339(), entry.summary);
    }

    Ok(())
}
