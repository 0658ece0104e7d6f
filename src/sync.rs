//! One complete sync run: preconditions, import, then export.
//!
//! Import always runs first. Stars it creates are ledgered, so the export
//! pass of the same run does not send them back.

use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::error::{StoreError, SyncError};
use crate::export::export_stars;
use crate::import::run_import;
use crate::lastfm::{Credentials, RemoteService};
use crate::models::{SyncReport, User};
use crate::store::{LocalStore, SETTING_LASTFM_API_KEY, SETTING_LASTFM_SECRET};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub local_username: String,
    pub lastfm_username: String,
    pub min_star_date: Option<DateTime<Utc>>,
    pub import: bool,
    pub export: bool,
}

/// Look up the local user, mapping an unknown name to a precondition error.
pub fn find_user<S: LocalStore>(store: &S, name: &str) -> Result<User, SyncError> {
    match store.find_user(name) {
        Ok(user) => Ok(user),
        Err(StoreError::UserNotFound(name)) => Err(SyncError::Precondition(format!(
            "local user {:?} does not exist",
            name
        ))),
        Err(source) => Err(SyncError::Store {
            op: "find user",
            user_id: 0,
            track_id: None,
            source,
        }),
    }
}

fn stored_setting<S: LocalStore>(store: &S, key: &'static str) -> Result<Option<String>, SyncError> {
    store.setting(key).map_err(|source| SyncError::Store {
        op: "read setting",
        user_id: 0,
        track_id: None,
        source,
    })
}

/// API key and secret from the overrides, falling back to the library
/// settings. Both must be present.
pub fn resolve_credentials<S: LocalStore>(
    store: &S,
    api_key: Option<&str>,
    secret: Option<&str>,
) -> Result<Credentials, SyncError> {
    let api_key = match api_key {
        Some(key) => Some(key.to_string()),
        None => stored_setting(store, SETTING_LASTFM_API_KEY)?,
    };
    let secret = match secret {
        Some(secret) => Some(secret.to_string()),
        None => stored_setting(store, SETTING_LASTFM_SECRET)?,
    };

    match (api_key, secret) {
        (Some(api_key), Some(secret)) => Ok(Credentials { api_key, secret }),
        (None, _) => Err(SyncError::Precondition(
            "no Last.fm API key configured in the library or the options".to_string(),
        )),
        (_, None) => Err(SyncError::Precondition(
            "no Last.fm API secret configured in the library or the options".to_string(),
        )),
    }
}

/// Run import then export for one user.
pub fn run<S: LocalStore, R: RemoteService>(
    store: &S,
    remote: &R,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let start = Instant::now();

    let user = find_user(store, &options.local_username)?;
    if options.export && user.lastfm_session.is_none() {
        return Err(SyncError::Precondition(format!(
            "local user {:?} has no Last.fm session; link the account first",
            user.name
        )));
    }

    store
        .ensure_ledger()
        .map_err(SyncError::store("create upload ledger", user.id, None))?;

    let mut report = SyncReport {
        user: user.name.clone(),
        ..SyncReport::default()
    };

    if options.import {
        report.import = Some(run_import(store, remote, &user, &options.lastfm_username)?);
    }
    if options.export {
        report.export = Some(export_stars(store, remote, &user, options.min_star_date)?);
    }

    report.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(report)
}
