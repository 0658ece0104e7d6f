//! Local → remote: love on Last.fm every local star not yet in the ledger.
//!
//! A ledger entry is written only after the service acknowledged the love, so
//! a failed run leaves exactly the unsent stars for the next attempt.

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::lastfm::RemoteService;
use crate::models::{ExportReport, User};
use crate::progress::TrackProgress;
use crate::store::LocalStore;

/// Push unledgered stars of `user`, oldest first.
///
/// Stars older than `min_star_date` are left untouched: not pushed and not
/// ledgered.
pub fn export_stars<S: LocalStore, R: RemoteService>(
    store: &S,
    remote: &R,
    user: &User,
    min_star_date: Option<DateTime<Utc>>,
) -> Result<ExportReport, SyncError> {
    let pending = store
        .starred_without_ledger_entry(user.id)
        .map_err(SyncError::store("find unexported stars", user.id, None))?;

    let mut report = ExportReport {
        candidates: pending.len(),
        ..ExportReport::default()
    };

    let mut progress = TrackProgress::new("export", pending.len(), 50, "Exporting local stars");

    for starred in pending {
        progress.tick();

        if min_star_date.is_some_and(|cutoff| starred.starred_at < cutoff) {
            report.skipped_before_cutoff += 1;
            continue;
        }

        let track = &starred.track;
        remote
            .love_track(user, track)
            .map_err(SyncError::remote("love track", user.id, Some(track.id)))?;
        store
            .upsert_ledger_entry(user.id, track.id)
            .map_err(SyncError::store("record star upload", user.id, Some(track.id)))?;

        tracing::debug!(track_id = track.id, artist = %track.artist, title = %track.title, "exported star");
        report.exported += 1;
    }

    progress.finish(format!("Exported local stars: {}", report));
    tracing::info!(
        user = %user.name,
        skipped = report.skipped_before_cutoff,
        "saved local->lastfm stars {}",
        report
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lastfm::testing::FakeRemote;
    use crate::store::testing::*;
    use crate::store::SqliteStore;

    fn setup() -> (SqliteStore, User) {
        let store = seeded_store(&[(1, "Artist A", "Song A"), (2, "Artist B", "Song B"), (3, "Artist C", "Song C")]);
        let user = store.find_user("alice").unwrap();
        (store, user)
    }

    #[test]
    fn test_exports_unledgered_star_once() {
        let (store, user) = setup();
        store.upsert_star(user.id, 2, ts(100)).unwrap();
        let remote = FakeRemote::default();

        let first = export_stars(&store, &remote, &user, None).unwrap();
        assert_eq!(first.exported, 1);
        assert_eq!(remote.pushed(), vec![2]);
        assert!(has_ledger_entry(&store, user.id, 2));

        let second = export_stars(&store, &remote, &user, None).unwrap();
        assert_eq!(second.exported, 0);
        assert_eq!(second.candidates, 0);
        assert_eq!(remote.pushed(), vec![2]);
    }

    #[test]
    fn test_ledgered_stars_are_not_pushed() {
        let (store, user) = setup();
        store.upsert_star(user.id, 1, ts(100)).unwrap();
        store.upsert_ledger_entry(user.id, 1).unwrap();
        let remote = FakeRemote::default();

        let report = export_stars(&store, &remote, &user, None).unwrap();
        assert_eq!(report.exported, 0);
        assert!(remote.pushed().is_empty());
    }

    #[test]
    fn test_failed_push_is_retried_next_run() {
        let (store, user) = setup();
        store.upsert_star(user.id, 1, ts(100)).unwrap();
        store.upsert_star(user.id, 2, ts(200)).unwrap();
        store.upsert_star(user.id, 3, ts(300)).unwrap();
        let remote = FakeRemote::default();
        remote.fail_on(2);

        let err = export_stars(&store, &remote, &user, None).unwrap_err();
        match err {
            SyncError::Remote { op, user_id, track_id, .. } => {
                assert_eq!(op, "love track");
                assert_eq!(user_id, user.id);
                assert_eq!(track_id, Some(2));
            }
            other => panic!("expected Remote error, got {:?}", other),
        }
        // oldest star went out before the failure; the failed one has no entry
        assert_eq!(remote.pushed(), vec![1]);
        assert!(has_ledger_entry(&store, user.id, 1));
        assert!(!has_ledger_entry(&store, user.id, 2));
        assert!(!has_ledger_entry(&store, user.id, 3));

        remote.clear_failures();
        let report = export_stars(&store, &remote, &user, None).unwrap();
        assert_eq!(report.exported, 2);
        assert_eq!(remote.pushed(), vec![1, 2, 3]);
    }

    #[test]
    fn test_min_star_date_skips_old_stars() {
        let (store, user) = setup();
        store.upsert_star(user.id, 1, ts(100)).unwrap();
        store.upsert_star(user.id, 2, ts(1_000)).unwrap();
        let remote = FakeRemote::default();

        let report = export_stars(&store, &remote, &user, Some(ts(500))).unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.exported, 1);
        assert_eq!(report.skipped_before_cutoff, 1);
        assert_eq!(remote.pushed(), vec![2]);
        assert!(!has_ledger_entry(&store, user.id, 1));
    }

    #[test]
    fn test_missing_ledger_table_is_store_error() {
        let (store, user) = setup();
        store.upsert_star(user.id, 1, ts(100)).unwrap();
        store
            .connection()
            .execute_batch("DROP TABLE lastfm_star_uploads;")
            .unwrap();
        let remote = FakeRemote::default();

        let err = export_stars(&store, &remote, &user, None).unwrap_err();
        assert!(matches!(err, SyncError::Store { op: "find unexported stars", .. }));
        assert!(remote.pushed().is_empty());
    }
}
