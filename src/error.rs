//! Error types for the reconcilers and their collaborators.

/// Failures of the local library database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user {0:?} not found")]
    UserNotFound(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures talking to Last.fm.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("user {0:?} has no Last.fm session")]
    MissingSession(String),
}

/// Run-level error. `Store` and `Remote` carry the (user, track, operation)
/// needed to diagnose them.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("lock file '{}' unusable: {source}", .path.display())]
    LockFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed for user {user_id}{}: {source}", track_suffix(.track_id))]
    Store {
        op: &'static str,
        user_id: i64,
        track_id: Option<i64>,
        #[source]
        source: StoreError,
    },

    #[error("{op} failed for user {user_id}{}: {source}", track_suffix(.track_id))]
    Remote {
        op: &'static str,
        user_id: i64,
        track_id: Option<i64>,
        #[source]
        source: RemoteError,
    },
}

fn track_suffix(track_id: &Option<i64>) -> String {
    match track_id {
        Some(id) => format!(", track {}", id),
        None => String::new(),
    }
}

impl SyncError {
    pub fn store(op: &'static str, user_id: i64, track_id: Option<i64>) -> impl FnOnce(StoreError) -> Self {
        move |source| SyncError::Store {
            op,
            user_id,
            track_id,
            source,
        }
    }

    pub fn remote(op: &'static str, user_id: i64, track_id: Option<i64>) -> impl FnOnce(RemoteError) -> Self {
        move |source| SyncError::Remote {
            op,
            user_id,
            track_id,
            source,
        }
    }
}
