//! Remote → local: star local tracks that are loved on Last.fm.
//!
//! Every imported star also gets a ledger entry, so the export pass never
//! sends a star back to the service it just came from. The first storage
//! failure aborts the run; unresolved loved tracks are only reported.

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::lastfm::RemoteService;
use crate::models::{ImportReport, LocalTrack, RemoteLovedTrack, User};
use crate::progress::TrackProgress;
use crate::resolve::Corpus;
use crate::store::LocalStore;

/// Resolve each loved track against `local_tracks` and record matches.
///
/// `now` stands in for loved tracks the service reported without a date.
pub fn import_loved_tracks<S: LocalStore>(
    store: &S,
    user: &User,
    local_tracks: &[LocalTrack],
    loved: &[RemoteLovedTrack],
    now: DateTime<Utc>,
) -> Result<ImportReport, SyncError> {
    let corpus = Corpus::build(local_tracks.iter().map(|t| (t.artist.as_str(), t.title.as_str())));

    let mut report = ImportReport {
        total: loved.len(),
        ..ImportReport::default()
    };

    let mut progress = TrackProgress::new("import", loved.len(), 100, "Importing Last.fm loves");

    for remote in loved {
        progress.tick();

        let Some(found) = corpus.resolve(&remote.artist, &remote.title) else {
            tracing::warn!(artist = %remote.artist, title = %remote.title, "no local match for loved track");
            report.unmatched.push(remote.clone());
            continue;
        };
        let track = &local_tracks[found.index];

        tracing::debug!(
            artist = %remote.artist,
            title = %remote.title,
            track_id = track.id,
            score = found.score,
            "resolved loved track"
        );

        store
            .upsert_star(user.id, track.id, remote.loved_at.unwrap_or(now))
            .map_err(SyncError::store("save track star", user.id, Some(track.id)))?;
        store
            .upsert_ledger_entry(user.id, track.id)
            .map_err(SyncError::store("record star upload", user.id, Some(track.id)))?;

        report.matched += 1;
    }

    progress.finish(format!("Imported Last.fm loves: {}", report));
    tracing::info!(user = %user.name, "saved lastfm->local stars {}", report);
    Ok(report)
}

/// Fetch the loved list and local listing, then import.
pub fn run_import<S: LocalStore, R: RemoteService>(
    store: &S,
    remote: &R,
    user: &User,
    lastfm_username: &str,
) -> Result<ImportReport, SyncError> {
    let loved = remote
        .loved_tracks(lastfm_username)
        .map_err(SyncError::remote("fetch loved tracks", user.id, None))?;
    let local_tracks = store
        .list_tracks()
        .map_err(SyncError::store("list tracks", user.id, None))?;

    import_loved_tracks(store, user, &local_tracks, &loved, Utc::now())
}
