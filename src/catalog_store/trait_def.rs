//! CatalogStore trait definition.
//!
//! Abstracts catalog reads and the transactional play-recording write path
//! so the radio engine and the server can be tested against in-memory
//! implementations.

use anyhow::Result;
use thiserror::Error;

use super::models::{ListenEvent, MoodStats, Track};

/// Typed store failures that callers need to tell apart from plain I/O
/// errors. Carried inside the `anyhow` chain, recovered via `downcast_ref`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("track {0} does not exist")]
    TrackNotFound(i64),
}

/// Write operations available inside a single play-recording transaction.
///
/// Either every operation performed through this handle commits, or none
/// does: returning an error from the transaction closure rolls back all of
/// them.
pub trait PlayTx {
    /// Upsert the play statistic for the track's file path: increment the
    /// play count and stamp `last_played_at`. Fails with
    /// [`StoreError::TrackNotFound`] when the id does not exist.
    fn update_play_stats(&mut self, track_id: i64) -> Result<()>;

    /// Append one immutable listen event row.
    fn record_listen_event(&mut self, event: &ListenEvent) -> Result<()>;
}

/// Trait for catalog storage backends.
pub trait CatalogStore: Send + Sync {
    /// All approved tracks for a mood, optionally restricted to
    /// instrumentals, ordered by ascending play count then ascending
    /// last-played time with never-played tracks first.
    fn get_by_mood(&self, mood: &str, instrumental_only: bool) -> Result<Vec<Track>>;

    /// A single track by id.
    fn get_by_id(&self, track_id: i64) -> Result<Option<Track>>;

    /// Track count and total duration per mood, approved tracks only.
    fn get_mood_stats(&self) -> Result<Vec<MoodStats>>;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> Result<()>;

    /// Run `f` against a [`PlayTx`] inside one transaction. Any error
    /// returned by `f` rolls the whole transaction back before being
    /// propagated.
    fn with_play_tx(&self, f: &mut dyn FnMut(&mut dyn PlayTx) -> Result<()>) -> Result<()>;
}
