//! Last.fm client: loved-track listing and signed `track.love` calls.
//!
//! The reconcilers only see the `RemoteService` trait, so one client instance
//! is shared by both directions and tests can swap in a fake.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::RemoteError;
use crate::models::{LocalTrack, RemoteLovedTrack, User};

pub type Result<T> = std::result::Result<T, RemoteError>;

pub const API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Loved tracks requested per page
const PAGE_SIZE: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub trait RemoteService {
    fn loved_tracks(&self, username: &str) -> Result<Vec<RemoteLovedTrack>>;

    fn love_track(&self, user: &User, track: &LocalTrack) -> Result<()>;
}

/// Application credentials for the Last.fm API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Last.fm returns a bare object instead of an array when there is one item.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
struct LovedTracksResponse {
    lovedtracks: LovedTracksPage,
}

#[derive(Debug, Deserialize)]
struct LovedTracksPage {
    #[serde(default)]
    track: Option<OneOrMany<LovedTrack>>,
    #[serde(rename = "@attr")]
    attr: PageAttr,
}

#[derive(Debug, Deserialize)]
struct PageAttr {
    #[serde(rename = "totalPages")]
    total_pages: String,
}

#[derive(Debug, Deserialize)]
struct LovedTrack {
    name: String,
    artist: NamedEntity,
    #[serde(default)]
    date: Option<LovedDate>,
}

#[derive(Debug, Deserialize)]
struct NamedEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LovedDate {
    uts: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: i64,
    message: String,
}

// ============================================================================
// Parsing and Signing
// ============================================================================

/// Surface `{"error": n, "message": ...}` bodies as `RemoteError::Api`.
fn check_api_error(body: &str) -> Result<()> {
    if let Ok(err) = serde_json::from_str::<ApiError>(body) {
        return Err(RemoteError::Api {
            code: err.error,
            message: err.message,
        });
    }
    Ok(())
}

fn parse_uts(uts: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = uts.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Parse one page of `user.getLovedTracks`. Returns the tracks and the total
/// page count.
fn parse_loved_page(body: &str) -> Result<(Vec<RemoteLovedTrack>, u32)> {
    check_api_error(body)?;
    let resp: LovedTracksResponse = serde_json::from_str(body)?;
    let total_pages = resp.lovedtracks.attr.total_pages.trim().parse().unwrap_or(0);
    let tracks = resp
        .lovedtracks
        .track
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|t| RemoteLovedTrack {
            artist: t.artist.name,
            title: t.name,
            loved_at: t.date.as_ref().and_then(|d| parse_uts(&d.uts)),
        })
        .collect();
    Ok((tracks, total_pages))
}

/// `api_sig` for a write call: md5 of the sorted `keyvalue` pairs followed by
/// the shared secret. `format` and `callback` never take part.
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params
        .iter()
        .filter(|(k, _)| *k != "format" && *k != "callback")
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut payload = String::new();
    for (k, v) in sorted {
        payload.push_str(k);
        payload.push_str(v);
    }
    payload.push_str(secret);

    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Fetch pages 1, 2, ... until the reported page count is reached.
/// A count of 0 (no loved tracks) stops after the first page.
fn collect_pages<F>(mut fetch: F) -> Result<Vec<RemoteLovedTrack>>
where
    F: FnMut(u32) -> Result<(Vec<RemoteLovedTrack>, u32)>,
{
    let mut tracks = Vec::new();
    let mut page = 1;
    loop {
        let (batch, total_pages) = fetch(page)?;
        tracks.extend(batch);
        if page >= total_pages {
            break;
        }
        page += 1;
    }
    Ok(tracks)
}

// ============================================================================
// Client
// ============================================================================

pub struct LastFmClient {
    credentials: Credentials,
    client: Client,
}

impl LastFmClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("star-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            credentials,
            client,
        })
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<String> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            // Error bodies carry a more useful message than the status
            check_api_error(&body)?;
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn fetch_loved_page(&self, username: &str, page: u32) -> Result<(Vec<RemoteLovedTrack>, u32)> {
        let page = page.to_string();
        let limit = PAGE_SIZE.to_string();
        let params = [
            ("method", "user.getlovedtracks"),
            ("user", username),
            ("api_key", self.credentials.api_key.as_str()),
            ("limit", limit.as_str()),
            ("page", page.as_str()),
            ("format", "json"),
        ];

        tracing::debug!(user = username, page = %page, "fetching loved tracks");

        let response = self.client.get(API_URL).query(&params).send()?;
        parse_loved_page(&Self::read_body(response)?)
    }
}

impl RemoteService for LastFmClient {
    fn loved_tracks(&self, username: &str) -> Result<Vec<RemoteLovedTrack>> {
        let tracks = collect_pages(|page| self.fetch_loved_page(username, page))?;
        tracing::info!(user = username, count = tracks.len(), "fetched loved tracks");
        Ok(tracks)
    }

    fn love_track(&self, user: &User, track: &LocalTrack) -> Result<()> {
        let session = user
            .lastfm_session
            .as_deref()
            .ok_or_else(|| RemoteError::MissingSession(user.name.clone()))?;

        let mut params = vec![
            ("method", "track.love"),
            ("artist", track.artist.as_str()),
            ("track", track.title.as_str()),
            ("api_key", self.credentials.api_key.as_str()),
            ("sk", session),
        ];
        let signature = sign(&params, &self.credentials.secret);
        params.push(("api_sig", signature.as_str()));
        params.push(("format", "json"));

        let response = self.client.post(API_URL).form(&params).send()?;
        let body = Self::read_body(response)?;
        check_api_error(&body)?;

        tracing::debug!(track_id = track.id, artist = %track.artist, title = %track.title, "loved track");
        Ok(())
    }
}
