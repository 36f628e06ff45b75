use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Rolling de-duplication window for error notifications. A key is admitted
/// once per trailing window; entries older than the window are purged on
/// every call, so the map stays bounded by the number of distinct errors
/// seen recently.
pub struct DedupCache {
    window: Duration,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Ten minutes, matching the operator-notification policy.
    pub fn standard() -> Self {
        Self::new(Duration::minutes(10))
    }

    /// Returns true when the key has not been seen within the window and
    /// records it at `now`. Time is injected so tests control the clock.
    pub fn admit(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut seen = self.seen.lock();
        let horizon = now - self.window;
        seen.retain(|_, sent_at| *sent_at >= horizon);
        if seen.contains_key(key) {
            return false;
        }
        seen.insert(key.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, minute, second).unwrap()
    }

    #[test]
    fn duplicate_within_window_is_rejected() {
        let cache = DedupCache::standard();
        assert!(cache.admit("connect refused", at(0, 0)));
        assert!(!cache.admit("connect refused", at(9, 59)));
    }

    #[test]
    fn duplicate_after_window_is_admitted_again() {
        let cache = DedupCache::standard();
        assert!(cache.admit("connect refused", at(0, 0)));
        assert!(cache.admit("connect refused", at(10, 1)));
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let cache = DedupCache::standard();
        assert!(cache.admit("timeout", at(0, 0)));
        assert!(cache.admit("dns failure", at(0, 1)));
        assert!(!cache.admit("timeout", at(5, 0)));
    }

    #[test]
    fn purged_entries_free_the_key() {
        let cache = DedupCache::standard();
        assert!(cache.admit("a", at(0, 0)));
        // touching the cache with another key past the window purges "a"
        assert!(cache.admit("b", at(11, 0)));
        assert!(cache.admit("a", at(11, 1)));
    }
}
