//! In-memory request bookkeeping
//!
//! Two small single-process tables:
//! - [`ConfigCache`]: editor configuration responses with a fixed TTL
//! - [`RateLimiter`]: fixed-window request counters per client and path
//!
//! Neither survives a restart. Both take the current [`Instant`] as a
//! parameter so window arithmetic is testable without sleeping.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedConfig {
    data: Value,
    inserted_at: Instant,
}

#[derive(Default)]
struct ConfigTable {
    entries: HashMap<String, CachedConfig>,
    /// Bumped by every invalidation
    generation: u64,
}

/// Editor configuration responses keyed by file id
///
/// Builders read [`ConfigCache::generation`] before looking at the file and
/// pass it back on insert. An invalidation in between makes the insert a
/// no-op, so a config built from a superseded revision is never cached.
pub struct ConfigCache {
    table: Mutex<ConfigTable>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            table: Mutex::new(ConfigTable::default()),
            ttl,
        }
    }

    /// Fresh entry for `id`, dropping it if it has expired
    pub fn get_at(&self, id: &str, now: Instant) -> Option<Value> {
        let mut table = self.lock();
        let expired = match table.entries.get(id) {
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < self.ttl => {
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            table.entries.remove(id);
        }
        None
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.get_at(id, Instant::now())
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `data` unless an invalidation happened since `generation` was
    /// read; returns whether the entry was stored
    pub fn insert_at(&self, id: &str, data: Value, generation: u64, now: Instant) -> bool {
        let mut table = self.lock();
        if table.generation != generation {
            debug!("Not caching config for {}: invalidated while building", id);
            return false;
        }
        table.entries.insert(
            id.to_string(),
            CachedConfig {
                data,
                inserted_at: now,
            },
        );
        true
    }

    pub fn insert(&self, id: &str, data: Value, generation: u64) -> bool {
        self.insert_at(id, data, generation, Instant::now())
    }

    /// Forget `id` after the file changed or was deleted
    pub fn invalidate(&self, id: &str) {
        let mut table = self.lock();
        table.generation = table.generation.wrapping_add(1);
        if table.entries.remove(id).is_some() {
            debug!("Invalidated cached config for {}", id);
        }
    }

    /// Drop every expired entry; returns how many were removed
    pub fn sweep(&self, now: Instant) -> usize {
        let mut table = self.lock();
        let before = table.entries.len();
        table
            .entries
            .retain(|_, e| now.saturating_duration_since(e.inserted_at) <= self.ttl);
        before - table.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConfigTable> {
        // A poisoned map only holds plain data; keep serving from it
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Window {
    count: u32,
    started_at: Instant,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

/// Fixed-window request counter
///
/// The first request for a key opens a window. Requests inside the window
/// are admitted until `max_requests` have been counted; once the window is
/// older than `window` the next request starts a new one.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.lock();

        let w = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started_at: now,
        });

        if w.count == 0 || now.saturating_duration_since(w.started_at) > self.window {
            w.count = 1;
            w.started_at = now;
            return RateDecision::Allowed;
        }

        if w.count >= self.max_requests {
            return RateDecision::Limited;
        }

        w.count += 1;
        RateDecision::Allowed
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Drop windows older than twice the window length
    pub fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        let horizon = self.window * 2;
        windows.retain(|_, w| now.saturating_duration_since(w.started_at) <= horizon);
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Periodically sweep both tables until the runtime shuts down
pub fn spawn_sweeper(
    configs: Arc<ConfigCache>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = Instant::now();
            let configs_removed = configs.sweep(now);
            let windows_removed = limiter.sweep(now);
            if configs_removed + windows_removed > 0 {
                debug!(
                    "Cache sweep removed {} configs, {} rate windows",
                    configs_removed, windows_removed
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_config_cache_hit_within_ttl() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("a.docx", json!({"success": true}), cache.generation(), t0);

        let hit = cache.get_at("a.docx", t0 + Duration::from_secs(59));
        assert_eq!(hit, Some(json!({"success": true})));
    }

    #[test]
    fn test_config_cache_expired_entry_removed_on_access() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("a.docx", json!(1), cache.generation(), t0);

        assert_eq!(cache.get_at("a.docx", t0 + Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_config_cache_invalidate() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        cache.insert("a.docx", json!(1), cache.generation());
        cache.insert("b.docx", json!(2), cache.generation());

        cache.invalidate("a.docx");
        assert_eq!(cache.get("a.docx"), None);
        assert_eq!(cache.get("b.docx"), Some(json!(2)));
    }

    #[test]
    fn test_config_cache_sweep() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let generation = cache.generation();
        cache.insert_at("old", json!(1), generation, t0);
        cache.insert_at("new", json!(2), generation, t0 + Duration::from_secs(30));

        assert_eq!(cache.sweep(t0 + Duration::from_secs(61)), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_config_cache_skips_insert_after_invalidation() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        let generation = cache.generation();

        // A save lands while the config is being built
        cache.invalidate("a.docx");
        assert!(!cache.insert("a.docx", json!({"key": "stale"}), generation));
        assert_eq!(cache.get("a.docx"), None);

        assert!(cache.insert("a.docx", json!({"key": "fresh"}), cache.generation()));
        assert_eq!(cache.get("a.docx"), Some(json!({"key": "fresh"})));
    }

    #[test]
    fn test_rate_limiter_allows_max_then_limits() {
        let limiter = RateLimiter::new(WINDOW, 5);
        let t0 = Instant::now();

        for i in 0..5 {
            assert_eq!(
                limiter.check_at("k", t0 + Duration::from_millis(i * 10)),
                RateDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_at("k", t0 + Duration::from_millis(100)),
            RateDecision::Limited
        );
        // Rejections are not counted; still limited at the window edge
        assert_eq!(limiter.check_at("k", t0 + WINDOW), RateDecision::Limited);
    }

    #[test]
    fn test_rate_limiter_new_window_after_expiry() {
        let limiter = RateLimiter::new(WINDOW, 1);
        let t0 = Instant::now();

        assert_eq!(limiter.check_at("k", t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("k", t0), RateDecision::Limited);
        assert_eq!(
            limiter.check_at("k", t0 + WINDOW + Duration::from_millis(1)),
            RateDecision::Allowed
        );
    }

    #[test]
    fn test_rate_limiter_keys_independent() {
        let limiter = RateLimiter::new(WINDOW, 1);
        let t0 = Instant::now();

        assert_eq!(limiter.check_at("1.2.3.4_/api/file/a", t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("1.2.3.4_/api/file/b", t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("5.6.7.8_/api/file/a", t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("1.2.3.4_/api/file/a", t0), RateDecision::Limited);
    }

    #[test]
    fn test_rate_limiter_sweep_uses_double_window() {
        let limiter = RateLimiter::new(WINDOW, 5);
        let t0 = Instant::now();
        limiter.check_at("old", t0);
        limiter.check_at("recent", t0 + WINDOW);

        assert_eq!(limiter.sweep(t0 + WINDOW * 2), 0);
        assert_eq!(limiter.sweep(t0 + WINDOW * 2 + Duration::from_millis(1)), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_runs_on_interval() {
        let configs = Arc::new(ConfigCache::new(Duration::from_millis(1)));
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1), 5));
        configs.insert("a.docx", json!(1), configs.generation());
        limiter.check("k");
        tokio::time::sleep(Duration::from_millis(5)).await;

        let handle = spawn_sweeper(configs.clone(), limiter.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(configs.is_empty());
        assert!(limiter.is_empty());
        handle.abort();
    }
}
