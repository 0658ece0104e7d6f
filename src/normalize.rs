//! Search-key normalization for matching remote loved tracks to local tracks.
//!
//! Both sides of a comparison MUST go through `search_key`: the local corpus
//! and every remote query. Keys are only matching handles and are never stored.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Trailing featured-artist clause: "Song feat. Someone", "Artist ft. X (Live)".
/// Everything from the credit to the end of the field is dropped.
pub static FEATURING_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:featuring|feat|ft)\b.*$").unwrap());

/// Low-information connectors, removed only when surrounded by spaces so that
/// "theatre" or "anderson" survive.
pub const CONNECTOR_WORDS: &[&str] = &["and", "&", "vs", "vs.", "his", "the", "with"];

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Strip the featured-artist clause from a single (already lower-cased) field.
pub fn strip_featuring(field: &str) -> String {
    FEATURING_CLAUSE.replace(field, "").to_string()
}

/// Remove connector words that appear as standalone words.
///
/// The input is padded with a space on both sides, so a leading "the " counts.
/// Replacement keeps one space, and the pass repeats until nothing changes so
/// that runs like "rock and the roll" lose both connectors.
pub fn strip_connectors(s: &str) -> String {
    let mut result = format!(" {} ", s);
    loop {
        let before = result.len();
        for word in CONNECTOR_WORDS {
            let needle = format!(" {} ", word);
            while result.contains(&needle) {
                result = result.replace(&needle, " ");
            }
        }
        if result.len() == before {
            break;
        }
    }
    result
}

/// Canonicalize an (artist, title) pair into a matchable key.
///
/// Lower-case, drop "feat." clauses per field, concatenate artist then title,
/// drop connector words, then keep only letters and digits.
/// e.g. ("The Beatles", "Hey Jude feat. Nobody") → "beatlesheyjude"
pub fn search_key(artist: &str, title: &str) -> String {
    let artist: String = artist.nfc().collect::<String>().to_lowercase();
    let title: String = title.nfc().collect::<String>().to_lowercase();

    let joined = format!("{}{}", strip_featuring(&artist), strip_featuring(&title));

    strip_connectors(&joined)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
