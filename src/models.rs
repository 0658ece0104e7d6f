//! Core data models for star reconciliation.
//!
//! Local entities mirror rows of the music-library database; remote entities
//! are transient and fetched fresh on every run.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Local Library Models
// ============================================================================

/// A user of the local library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Last.fm session key, required to love tracks on the user's behalf
    pub lastfm_session: Option<String>,
}

/// Track as tagged in the local library (read-only here).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: i64,
    pub artist: String,
    pub title: String,
}

/// A local star with no ledger entry yet, i.e. an export candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StarredTrack {
    pub track: LocalTrack,
    pub starred_at: DateTime<Utc>,
}

// ============================================================================
// Remote Models
// ============================================================================

/// Entry of the remote loved-tracks list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteLovedTrack {
    pub artist: String,
    pub title: String,
    /// `None` when the service reported no usable date
    pub loved_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of a remote → local import.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ImportReport {
    pub matched: usize,
    pub total: usize,
    pub unmatched: Vec<RemoteLovedTrack>,
}

impl ImportReport {
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.matched as f64 / self.total as f64
        }
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} matched", self.matched, self.total)
    }
}

/// Outcome of a local → remote export.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Stars pushed and recorded in the ledger during this run
    pub exported: usize,
    /// Unledgered stars found for the user
    pub candidates: usize,
    /// Candidates left alone because they predate the minimum star date
    pub skipped_before_cutoff: usize,
}

impl std::fmt::Display for ExportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} exported", self.exported, self.candidates)
    }
}

/// Everything a run did, for the summary and `--stats-json`.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SyncReport {
    pub user: String,
    pub import: Option<ImportReport>,
    pub export: Option<ExportReport>,
    pub elapsed_seconds: f64,
}

impl SyncReport {
    /// Write the report to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_report_display() {
        let report = ImportReport {
            matched: 1,
            total: 1,
            unmatched: vec![],
        };
        assert_eq!(report.to_string(), "1/1 matched");
        assert_eq!(report.match_rate(), 100.0);
        assert_eq!(ImportReport::default().match_rate(), 0.0);
    }

    #[test]
    fn test_sync_report_serializes() {
        let report = SyncReport {
            user: "alice".to_string(),
            import: Some(ImportReport {
                matched: 0,
                total: 1,
                unmatched: vec![RemoteLovedTrack {
                    artist: "Totally Different".to_string(),
                    title: "Nothing Alike".to_string(),
                    loved_at: None,
                }],
            }),
            export: None,
            elapsed_seconds: 0.5,
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["import"]["matched"], 0);
        assert_eq!(json["import"]["unmatched"][0]["artist"], "Totally Different");
        assert!(json["export"].is_null());
    }
}
