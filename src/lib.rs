//! Star reconciliation between a local music library and Last.fm loved tracks.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod lastfm;
pub mod lock;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolve;
pub mod store;
pub mod sync;
