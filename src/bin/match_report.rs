//! Show how Last.fm loved tracks resolve against the local library.
//! Read-only: no stars or ledger entries are written.
//!
//! Usage: match-report --db-path <library.db> --lastfm-username <name> [--unmatched-only]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use star_sync::config::{CommonArgs, RunArgs, Settings};
use star_sync::lastfm::{LastFmClient, RemoteService};
use star_sync::normalize::search_key;
use star_sync::resolve::Corpus;
use star_sync::store::{LocalStore, SqliteStore};
use star_sync::sync::resolve_credentials;

#[derive(Parser)]
#[command(name = "match-report")]
#[command(about = "Report how Last.fm loved tracks resolve to local tracks")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Only list loved tracks without a local match
    #[arg(long)]
    unmatched_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load(&cli.common, &RunArgs::default())?;
    let lastfm_username = settings.lastfm_username()?;

    let store = SqliteStore::open(&settings.db_path).context("Failed to open library database")?;
    let credentials = resolve_credentials(
        &store,
        settings.lastfm_api_key.as_deref(),
        settings.lastfm_secret.as_deref(),
    )?;
    let client = LastFmClient::new(credentials).context("Failed to build Last.fm client")?;

    let tracks = store.list_tracks().context("Failed to list local tracks")?;
    let loved = client
        .loved_tracks(lastfm_username)
        .context("Failed to fetch loved tracks")?;

    let corpus = Corpus::build(tracks.iter().map(|t| (t.artist.as_str(), t.title.as_str())));
    if corpus.is_empty() {
        tracing::warn!(db = %settings.db_path.display(), "library has no tracks, nothing can match");
    }
    println!("Resolving {} loved tracks against {} local tracks", loved.len(), corpus.len());
    println!("{:-<80}", "");

    let mut matched = 0usize;
    for remote in &loved {
        match corpus.resolve(&remote.artist, &remote.title) {
            Some(found) => {
                matched += 1;
                if cli.unmatched_only {
                    continue;
                }
                let track = &tracks[found.index];
                println!(
                    "[{:.2}] {} - {}  =>  [{}] {} - {}",
                    found.score, remote.artist, remote.title, track.id, track.artist, track.title
                );
            }
            None => {
                println!(
                    "[----] {} - {}  (key {:?})",
                    remote.artist,
                    remote.title,
                    search_key(&remote.artist, &remote.title)
                );
            }
        }
    }

    println!("{:-<80}", "");
    println!("{}/{} matched", matched, loved.len());

    Ok(())
}
