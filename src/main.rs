use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use star_sync::config::{CommonArgs, RunArgs, Settings};
use star_sync::lastfm::LastFmClient;
use star_sync::lock::RunLock;
use star_sync::progress::{format_duration, set_log_only};
use star_sync::store::SqliteStore;
use star_sync::sync::{self, resolve_credentials, SyncOptions};

#[derive(Parser)]
#[command(name = "star-sync")]
#[command(about = "Sync loved tracks between Last.fm and a local music library")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    run: RunArgs,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    stats_json: Option<std::path::PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    set_log_only(cli.log_only);

    let settings = Settings::load(&cli.common, &cli.run)?;
    let options = SyncOptions {
        local_username: settings.local_username()?.to_string(),
        lastfm_username: settings.lastfm_username()?.to_string(),
        min_star_date: settings.min_star_date,
        import: !settings.skip_import,
        export: !settings.skip_export,
    };

    let start = Instant::now();

    let _lock = RunLock::acquire(&settings.db_path)?;

    tracing::info!(db = %settings.db_path.display(), "opening library database");
    let store = SqliteStore::open(&settings.db_path).context("Failed to open library database")?;

    let credentials = resolve_credentials(
        &store,
        settings.lastfm_api_key.as_deref(),
        settings.lastfm_secret.as_deref(),
    )?;
    let client = LastFmClient::new(credentials).context("Failed to build Last.fm client")?;

    let report = sync::run(&store, &client, &options).context("Star sync failed")?;

    println!("\n{:=<60}", "");
    println!("Star sync complete for {}", report.user);
    match &report.import {
        Some(import) => println!("  Last.fm -> library: {} ({:.1}%)", import, import.match_rate()),
        None => println!("  Last.fm -> library: skipped"),
    }
    match &report.export {
        Some(export) => println!(
            "  Library -> Last.fm: {} ({} older than cutoff)",
            export, export.skipped_before_cutoff
        ),
        None => println!("  Library -> Last.fm: skipped"),
    }
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if let Some(path) = cli.stats_json {
        report
            .write_to_file(&path)
            .with_context(|| format!("Failed to write stats to '{}'", path.display()))?;
    }

    Ok(())
}
