//! Run exclusion for a library database.
//!
//! Two concurrent runs against the same database would race on the ledger and
//! could love a track twice. The CLI holds an exclusive advisory lock on
//! `<db>.star-sync.lock` for the whole run. The OS drops the lock when the
//! process exits, however it exits, so a killed run never blocks the next one.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Lock file path for a database: `<db>.star-sync.lock`.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".star-sync.lock");
    db_path.with_file_name(name)
}

/// Held for the duration of a run. Dropping it releases the lock.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// Acquire the lock for `db_path`, failing if another run holds it.
    pub fn acquire(db_path: &Path) -> Result<Self, SyncError> {
        let path = lock_path(db_path);
        let lock_err = |source| SyncError::LockFile {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_err)?;

        if file.try_lock_exclusive().is_err() {
            return Err(SyncError::Precondition(format!(
                "another sync is running against '{}' (lock held at '{}')",
                db_path.display(),
                path.display()
            )));
        }

        // Informational only; the lock itself is what excludes other runs
        file.set_len(0).map_err(lock_err)?;
        writeln!(file, "{}", std::process::id()).map_err(lock_err)?;

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/var/lib/music/library.db")),
            PathBuf::from("/var/lib/music/library.db.star-sync.lock")
        );
    }

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("library.db");

        let first = RunLock::acquire(&db).unwrap();
        assert!(first.path().exists());

        let err = RunLock::acquire(&db).unwrap_err();
        assert!(matches!(err, SyncError::Precondition(_)));
        assert!(err.to_string().contains("another sync is running"));

        drop(first);
        let again = RunLock::acquire(&db).unwrap();
        drop(again);
    }

    #[test]
    fn test_leftover_lock_file_from_killed_run_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("library.db");
        // A killed run leaves the file behind but no process holds the lock
        std::fs::write(lock_path(&db), "12345\n").unwrap();

        let lock = RunLock::acquire(&db).unwrap();
        let pid = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_unwritable_location_is_lock_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing").join("library.db");

        let err = RunLock::acquire(&db).unwrap_err();
        assert!(matches!(err, SyncError::LockFile { .. }));
    }
}
