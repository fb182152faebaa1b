use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Short-lived record of models that recently failed, per provider.
///
/// A model is skipped only while its provider's whole record is younger than
/// the cooldown; once the record ages out the entire failed set is dropped at
/// the next read, so a degraded provider recovers automatically.
pub struct ModelFailureCache {
    cooldown: Duration,
    records: Mutex<HashMap<String, FailureRecord>>,
}

struct FailureRecord {
    failed: HashSet<String>,
    recorded_at: Instant,
}

impl ModelFailureCache {
    pub const COOLDOWN: Duration = Duration::from_secs(60);

    pub fn new() -> Self {
        Self::with_cooldown(Self::COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failed model, refreshing the provider's record age.
    pub fn mark_failed(&self, provider: &str, model: &str) {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(provider.to_string())
            .or_insert_with(|| FailureRecord {
                failed: HashSet::new(),
                recorded_at: now,
            });
        if now.duration_since(record.recorded_at) >= self.cooldown {
            record.failed.clear();
        }
        record.failed.insert(model.to_string());
        record.recorded_at = now;
    }

    /// Filter a provider's roster down to models worth trying: the excluded
    /// (just-tried) model and anything in a fresh failure record are skipped.
    /// Stale records are evicted here rather than by a background task.
    pub fn list_available(
        &self,
        provider: &str,
        roster: &[String],
        exclude: Option<&str>,
    ) -> Vec<String> {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap();

        if let Some(record) = records.get(provider) {
            if now.duration_since(record.recorded_at) >= self.cooldown {
                records.remove(provider);
            }
        }

        let failed = records.get(provider).map(|r| &r.failed);
        roster
            .iter()
            .filter(|model| exclude != Some(model.as_str()))
            .filter(|model| failed.map_or(true, |f| !f.contains(*model)))
            .cloned()
            .collect()
    }
}

impl Default for ModelFailureCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_failed_model_is_skipped() {
        let cache = ModelFailureCache::new();
        let models = roster(&["a", "b", "c"]);

        cache.mark_failed("openai", "b");
        assert_eq!(
            cache.list_available("openai", &models, None),
            roster(&["a", "c"])
        );
    }

    #[test]
    fn test_exclude_removes_just_tried_model() {
        let cache = ModelFailureCache::new();
        let models = roster(&["a", "b"]);
        assert_eq!(
            cache.list_available("openai", &models, Some("a")),
            roster(&["b"])
        );
    }

    #[test]
    fn test_records_are_scoped_per_provider() {
        let cache = ModelFailureCache::new();
        let models = roster(&["a", "b"]);

        cache.mark_failed("openai", "a");
        assert_eq!(
            cache.list_available("mistral", &models, None),
            roster(&["a", "b"])
        );
    }

    #[test]
    fn test_cooldown_clears_whole_provider_record() {
        let cache = ModelFailureCache::with_cooldown(Duration::from_millis(30));
        let models = roster(&["a", "b", "c"]);

        cache.mark_failed("openai", "a");
        cache.mark_failed("openai", "b");
        assert_eq!(cache.list_available("openai", &models, None), roster(&["c"]));

        std::thread::sleep(Duration::from_millis(40));
        // both models come back at once, not one at a time
        assert_eq!(
            cache.list_available("openai", &models, None),
            roster(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_mark_failed_refreshes_record_age() {
        let cache = ModelFailureCache::with_cooldown(Duration::from_millis(50));
        let models = roster(&["a", "b"]);

        cache.mark_failed("openai", "a");
        std::thread::sleep(Duration::from_millis(30));
        cache.mark_failed("openai", "b");
        std::thread::sleep(Duration::from_millis(30));

        // the record was refreshed 30ms ago, so "a" and "b" are still out
        assert!(cache.list_available("openai", &models, None).is_empty());
    }
}
