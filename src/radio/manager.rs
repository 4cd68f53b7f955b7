//! Registry of per-mood radios.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::radio::Radio;
use crate::catalog_store::{CatalogStore, Track};

/// Lazily creates and caches one [`Radio`] per mood name. The common case
/// (radio already exists) only takes the read lock.
pub struct RadioManager {
    store: Arc<dyn CatalogStore>,
    max_recent: usize,
    radios: RwLock<HashMap<String, Arc<Radio>>>,
}

impl RadioManager {
    pub fn new(store: Arc<dyn CatalogStore>, max_recent: usize) -> Self {
        RadioManager {
            store,
            max_recent,
            radios: RwLock::new(HashMap::new()),
        }
    }

    /// The radio for a mood, created on first access and reused for the
    /// process lifetime.
    pub fn get_radio(&self, mood: &str) -> Arc<Radio> {
        if let Some(radio) = self.radios.read().unwrap().get(mood) {
            return radio.clone();
        }

        let mut radios = self.radios.write().unwrap();
        // Re-check under the write lock so racing callers share one instance.
        if let Some(radio) = radios.get(mood) {
            return radio.clone();
        }

        let radio = Arc::new(Radio::new(self.store.clone(), mood, self.max_recent));
        radios.insert(mood.to_string(), radio.clone());
        radio
    }

    pub fn get_playlist(&self, mood: &str, instrumental_only: bool) -> Result<Vec<Track>> {
        self.get_radio(mood).get_playlist(instrumental_only)
    }

    pub fn record_play(&self, mood: &str, track_id: i64) {
        self.get_radio(mood).record_play(track_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{ListenEvent, MoodStats, PlayTx};

    struct EmptyStore;

    impl CatalogStore for EmptyStore {
        fn get_by_mood(&self, _mood: &str, _instrumental_only: bool) -> Result<Vec<Track>> {
            Ok(vec![])
        }
        fn get_by_id(&self, _track_id: i64) -> Result<Option<Track>> {
            Ok(None)
        }
        fn get_mood_stats(&self) -> Result<Vec<MoodStats>> {
            Ok(vec![])
        }
        fn ping(&self) -> Result<()> {
            Ok(())
        }
        fn with_play_tx(
            &self,
            _f: &mut dyn FnMut(&mut dyn PlayTx) -> Result<()>,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reuses_one_radio_per_mood() {
        let manager = RadioManager::new(Arc::new(EmptyStore), 3);

        let first = manager.get_radio("focus");
        let second = manager.get_radio("focus");
        assert!(Arc::ptr_eq(&first, &second));

        let other = manager.get_radio("calm");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn record_play_lands_on_the_mood_radio() {
        let manager = RadioManager::new(Arc::new(EmptyStore), 3);
        manager.record_play("focus", 7);

        assert_eq!(manager.get_radio("focus").recent_tracks(), vec![7]);
        assert!(manager.get_radio("calm").recent_tracks().is_empty());
    }

    #[test]
    fn concurrent_access_creates_a_single_instance() {
        let manager = Arc::new(RadioManager::new(Arc::new(EmptyStore), 3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || manager.get_radio("focus"))
            })
            .collect();

        let radios: Vec<Arc<Radio>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for radio in &radios[1..] {
            assert!(Arc::ptr_eq(&radios[0], radio));
        }
        assert_eq!(manager.radios.read().unwrap().len(), 1);
    }
}
