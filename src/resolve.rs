//! Fuzzy resolution of a normalized query key against the local corpus.
//!
//! A candidate is considered only when the query is a subsequence of it
//! (every query character appears in order). Matching candidates are ranked
//! by normalized Levenshtein similarity. Ties go to the lowest corpus index,
//! i.e. the earliest track in the local listing.

use strsim::normalized_levenshtein;

use crate::normalize::search_key;

/// A resolved corpus entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Position in the corpus (and in the track listing it was built from)
    pub index: usize,
    /// Similarity in (0, 1]; 1.0 means identical keys
    pub score: f64,
}

/// True if every char of `needle` appears in `haystack` in order.
pub fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut rest = haystack.chars();
    needle.chars().all(|n| rest.any(|h| h == n))
}

/// Score `candidate` against `query`. `None` means no match.
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<f64> {
    if query.is_empty() || !is_subsequence(query, candidate) {
        return None;
    }
    Some(normalized_levenshtein(query, candidate))
}

/// Pick the best-ranked corpus entry for `query`, or `None` if nothing matches.
pub fn resolve(query: &str, corpus: &[String]) -> Option<Match> {
    corpus
        .iter()
        .enumerate()
        .filter_map(|(index, key)| fuzzy_score(query, key).map(|score| Match { index, score }))
        .max_by(|a, b| {
            // Primary: score (higher is better)
            // Tiebreaker: lower index
            a.score.total_cmp(&b.score).then_with(|| b.index.cmp(&a.index))
        })
}

/// Normalized keys for every local track, built once per run.
#[derive(Debug, Default, Clone)]
pub struct Corpus {
    keys: Vec<String>,
}

impl Corpus {
    pub fn build<'a, I>(tracks: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            keys: tracks
                .into_iter()
                .map(|(artist, title)| search_key(artist, title))
                .collect(),
        }
    }

    /// Normalize the remote pair and resolve it against the corpus.
    pub fn resolve(&self, artist: &str, title: &str) -> Option<Match> {
        resolve(&search_key(artist, title), &self.keys)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
