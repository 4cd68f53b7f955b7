//! Per-mood playlist engine.
//!
//! A `Radio` owns a bounded window of recently played track ids and
//! produces shuffled playlists that push those tracks to the tail, so a
//! listener does not hear the same song twice in quick succession.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::catalog_store::{CatalogStore, Track};

/// Number of recently played tracks remembered per mood by default.
pub const DEFAULT_MAX_RECENT: usize = 3;

/// Playlist engine for a single mood.
pub struct Radio {
    store: Arc<dyn CatalogStore>,
    mood: String,
    // One lock guards both the recency window and the RNG, so a shuffle in
    // progress always sees a consistent window.
    inner: Mutex<RadioInner>,
}

struct RadioInner {
    recent: VecDeque<i64>,
    max_recent: usize,
    rng: StdRng,
}

impl Radio {
    pub fn new(store: Arc<dyn CatalogStore>, mood: &str, max_recent: usize) -> Self {
        Self::with_rng(store, mood, max_recent, StdRng::from_os_rng())
    }

    /// Construct with an explicit RNG, for deterministic shuffles in tests.
    pub fn with_rng(
        store: Arc<dyn CatalogStore>,
        mood: &str,
        max_recent: usize,
        rng: StdRng,
    ) -> Self {
        Radio {
            store,
            mood: mood.to_string(),
            inner: Mutex::new(RadioInner {
                recent: VecDeque::with_capacity(max_recent),
                max_recent,
                rng,
            }),
        }
    }

    /// A freshly shuffled playlist for this mood. Recently played tracks are
    /// moved to the end; an empty catalog yields an empty playlist, not an
    /// error.
    pub fn get_playlist(&self, instrumental_only: bool) -> Result<Vec<Track>> {
        let tracks = self.store.get_by_mood(&self.mood, instrumental_only)?;
        if tracks.is_empty() {
            return Ok(tracks);
        }

        let mut inner = self.inner.lock().unwrap();
        Ok(inner.shuffle_with_recency(tracks))
    }

    /// Remember that a track was played. Adding an id already in the window
    /// is a no-op; otherwise the oldest entry is evicted once the window is
    /// full.
    pub fn record_play(&self, track_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.recent.contains(&track_id) {
            return;
        }
        inner.recent.push_back(track_id);
        if inner.recent.len() > inner.max_recent {
            inner.recent.pop_front();
        }
    }

    /// Snapshot of the recency window, oldest first.
    pub fn recent_tracks(&self) -> Vec<i64> {
        self.inner.lock().unwrap().recent.iter().copied().collect()
    }
}

impl RadioInner {
    fn shuffle_with_recency(&mut self, tracks: Vec<Track>) -> Vec<Track> {
        let recent_set: HashSet<i64> = self.recent.iter().copied().collect();

        // Partition keeps the store's relative order within each half.
        let (mut non_recent, recent): (Vec<Track>, Vec<Track>) = tracks
            .into_iter()
            .partition(|track| !recent_set.contains(&track.id));

        // Fisher-Yates over the non-recent half only; the recent tail keeps
        // its least-played-first order from the store.
        for i in (1..non_recent.len()).rev() {
            let j = self.rng.random_range(0..=i);
            non_recent.swap(i, j);
        }

        non_recent.extend(recent);
        non_recent
    }
}
