//! Shared store of the most recent level per stream.

use super::calculator::Level;
use crate::lock_or_recover;
use std::collections::HashMap;
use std::sync::Mutex;

/// Identifies a stream in a [`LevelCache`], e.g. an RTP SSRC.
pub type StreamKey = i64;

/// Key value meaning "no stream"; a cache registered with it stays inactive.
pub const INVALID_STREAM_KEY: StreamKey = -1;

/// Sink for computed levels keyed by stream. Shared across dispatchers.
pub trait LevelCache: Send + Sync {
    fn put_level(&self, key: StreamKey, level: Level);
}

/// Thread-safe map of stream key to last level.
#[derive(Debug, Default)]
pub struct AudioLevelMap {
    levels: Mutex<HashMap<StreamKey, Level>>,
}

impl AudioLevelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level stored for `key`.
    pub fn level(&self, key: StreamKey) -> Option<Level> {
        lock_or_recover(&self.levels, "AudioLevelMap::level")
            .get(&key)
            .copied()
    }

    /// Forget `key`, returning the level it held.
    pub fn remove_level(&self, key: StreamKey) -> Option<Level> {
        lock_or_recover(&self.levels, "AudioLevelMap::remove_level").remove(&key)
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.levels, "AudioLevelMap::len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LevelCache for AudioLevelMap {
    fn put_level(&self, key: StreamKey, level: Level) {
        lock_or_recover(&self.levels, "AudioLevelMap::put_level").insert(key, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn stores_and_replaces_levels() {
        let map = AudioLevelMap::new();
        assert!(map.is_empty());
        map.put_level(42, 10);
        map.put_level(42, 12);
        assert_eq!(map.level(42), Some(12));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_returns_previous_level() {
        let map = AudioLevelMap::new();
        map.put_level(7, 3);
        assert_eq!(map.remove_level(7), Some(3));
        assert_eq!(map.remove_level(7), None);
        assert_eq!(map.level(7), None);
    }

    #[test]
    fn concurrent_writers_keep_separate_keys() {
        let map = Arc::new(AudioLevelMap::new());
        let handles: Vec<_> = (0..4)
            .map(|key| {
                let map = map.clone();
                thread::spawn(move || {
                    for level in 0..100 {
                        map.put_level(key, level);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 4);
        for key in 0..4 {
            assert_eq!(map.level(key), Some(99));
        }
    }
}
