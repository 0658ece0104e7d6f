//! Local library access: users, tracks, stars, settings and the upload ledger.
//!
//! `SqliteStore` works against the music server's own database. The only
//! table it creates is the ledger; everything else belongs to the host.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::StoreError;
use crate::models::{LocalTrack, StarredTrack, User};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Settings keys holding the Last.fm application credentials.
pub const SETTING_LASTFM_API_KEY: &str = "lastfm_api_key";
pub const SETTING_LASTFM_SECRET: &str = "lastfm_secret";

/// Ledger of (user, track) stars already pushed to Last.fm. The key is the
/// whole entry.
const LEDGER_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS lastfm_star_uploads (
    user_id INTEGER NOT NULL,
    track_id INTEGER NOT NULL,
    PRIMARY KEY (user_id, track_id)
);";

pub trait LocalStore {
    fn find_user(&self, name: &str) -> Result<User>;

    fn list_tracks(&self) -> Result<Vec<LocalTrack>>;

    /// Insert or refresh the star; never creates a duplicate.
    fn upsert_star(&self, user_id: i64, track_id: i64, starred_at: DateTime<Utc>) -> Result<()>;

    /// Record that the star has been pushed. Existing entries are left as-is.
    fn upsert_ledger_entry(&self, user_id: i64, track_id: i64) -> Result<()>;

    /// Stars of `user_id` with no ledger entry, oldest star first.
    fn starred_without_ledger_entry(&self, user_id: i64) -> Result<Vec<StarredTrack>>;

    fn setting(&self, key: &str) -> Result<Option<String>>;

    /// Create the ledger if this database has never been synced.
    fn ensure_ledger(&self) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LocalStore for SqliteStore {
    fn find_user(&self, name: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, name, lastfm_session FROM users WHERE name = ?1",
                [name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        lastfm_session: row
                            .get::<_, Option<String>>(2)?
                            .filter(|s| !s.is_empty()),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    fn list_tracks(&self) -> Result<Vec<LocalTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, COALESCE(tag_track_artist, ''), COALESCE(tag_title, '')
             FROM tracks
             ORDER BY id",
        )?;
        let tracks = stmt
            .query_map([], |row| {
                Ok(LocalTrack {
                    id: row.get(0)?,
                    artist: row.get(1)?,
                    title: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn upsert_star(&self, user_id: i64, track_id: i64, starred_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO track_stars (user_id, track_id, star_date) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, track_id) DO UPDATE SET star_date = excluded.star_date",
            params![user_id, track_id, starred_at],
        )?;
        Ok(())
    }

    fn upsert_ledger_entry(&self, user_id: i64, track_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO lastfm_star_uploads (user_id, track_id) VALUES (?1, ?2)",
            params![user_id, track_id],
        )?;
        Ok(())
    }

    fn starred_without_ledger_entry(&self, user_id: i64) -> Result<Vec<StarredTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, COALESCE(t.tag_track_artist, ''), COALESCE(t.tag_title, ''), s.star_date
             FROM track_stars s
             JOIN tracks t ON t.id = s.track_id
             LEFT JOIN lastfm_star_uploads u
               ON u.user_id = s.user_id AND u.track_id = s.track_id
             WHERE s.user_id = ?1 AND u.track_id IS NULL
             ORDER BY julianday(s.star_date), t.id",
        )?;
        let starred = stmt
            .query_map([user_id], |row| {
                Ok(StarredTrack {
                    track: LocalTrack {
                        id: row.get(0)?,
                        artist: row.get(1)?,
                        title: row.get(2)?,
                    },
                    starred_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(starred)
    }

    fn setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten()
            .filter(|v| !v.is_empty());
        Ok(value)
    }

    fn ensure_ledger(&self) -> Result<()> {
        self.conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_find_user() {
        let store = seeded_store(&[]);
        let user = store.find_user("alice").unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.lastfm_session.as_deref(), Some("sk"));

        match store.find_user("bob") {
            Err(StoreError::UserNotFound(name)) => assert_eq!(name, "bob"),
            other => panic!("expected UserNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_session_is_none() {
        let store = seeded_store(&[]);
        store
            .connection()
            .execute("UPDATE users SET lastfm_session = '' WHERE id = 1", [])
            .unwrap();
        assert_eq!(store.find_user("alice").unwrap().lastfm_session, None);
    }

    #[test]
    fn test_list_tracks_tolerates_null_tags() {
        let store = seeded_store(&[(2, "B", "Two"), (1, "A", "One")]);
        store
            .connection()
            .execute("INSERT INTO tracks (id) VALUES (3)", [])
            .unwrap();
        let tracks = store.list_tracks().unwrap();
        assert_eq!(tracks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(tracks[2].artist, "");
        assert_eq!(tracks[2].title, "");
    }

    #[test]
    fn test_upsert_star_updates_timestamp() {
        let store = seeded_store(&[(1, "A", "One")]);
        store.upsert_star(1, 1, ts(100)).unwrap();
        store.upsert_star(1, 1, ts(200)).unwrap();
        assert_eq!(count(&store, "track_stars"), 1);
        assert_eq!(star_date(&store, 1, 1), Some(ts(200)));
    }

    #[test]
    fn test_ledger_is_insert_once() {
        let store = seeded_store(&[(1, "A", "One")]);
        store.upsert_ledger_entry(1, 1).unwrap();
        store.upsert_ledger_entry(1, 1).unwrap();
        assert_eq!(count(&store, "lastfm_star_uploads"), 1);
        assert!(has_ledger_entry(&store, 1, 1));
        // ensure_ledger is idempotent and keeps existing rows
        store.ensure_ledger().unwrap();
        assert!(has_ledger_entry(&store, 1, 1));
    }

    #[test]
    fn test_ledger_entry_is_key_only() {
        let store = seeded_store(&[]);
        let mut stmt = store
            .connection()
            .prepare("SELECT name FROM pragma_table_info('lastfm_star_uploads') ORDER BY cid")
            .unwrap();
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(columns, vec!["user_id", "track_id"]);
    }

    #[test]
    fn test_export_order_compares_instants_not_text() {
        let store = seeded_store(&[(1, "A", "One"), (2, "B", "Two")]);
        // Written by the host with a local offset: 00:00 UTC
        store
            .connection()
            .execute(
                "INSERT INTO track_stars (user_id, track_id, star_date)
                 VALUES (1, 2, '1970-01-01 02:00:00+02:00')",
                [],
            )
            .unwrap();
        // 00:30 UTC, sorts first as text
        store.upsert_star(1, 1, ts(1_800)).unwrap();

        let pending = store.starred_without_ledger_entry(1).unwrap();
        assert_eq!(
            pending.iter().map(|s| s.track.id).collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert_eq!(pending[0].starred_at, ts(0));
    }

    #[test]
    fn test_starred_without_ledger_entry_is_anti_join() {
        let store = seeded_store(&[(1, "A", "One"), (2, "B", "Two"), (3, "C", "Three")]);
        store.upsert_star(1, 3, ts(300)).unwrap();
        store.upsert_star(1, 1, ts(100)).unwrap();
        store.upsert_star(1, 2, ts(200)).unwrap();
        store.upsert_star(2, 2, ts(50)).unwrap();
        store.upsert_ledger_entry(1, 2).unwrap();

        let pending = store.starred_without_ledger_entry(1).unwrap();
        assert_eq!(
            pending.iter().map(|s| s.track.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(pending[0].starred_at, ts(100));
        assert_eq!(pending[1].track.title, "Three");

        // user 2's star of track 2 is not covered by user 1's ledger entry
        let other = store.starred_without_ledger_entry(2).unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].track.id, 2);
    }

    #[test]
    fn test_setting() {
        let store = seeded_store(&[]);
        store
            .connection()
            .execute_batch(
                "INSERT INTO settings (key, value) VALUES ('lastfm_api_key', 'key');
                 INSERT INTO settings (key, value) VALUES ('lastfm_secret', '');",
            )
            .unwrap();
        assert_eq!(store.setting(SETTING_LASTFM_API_KEY).unwrap().as_deref(), Some("key"));
        assert_eq!(store.setting(SETTING_LASTFM_SECRET).unwrap(), None);
        assert_eq!(store.setting("missing").unwrap(), None);
    }
}
