use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Soft per-caller abuse guard. Counters live in memory only and are evicted
/// lazily when a caller comes back after their window expired.
pub struct RateLimiter {
    ceiling: u32,
    window: Duration,
    counters: Mutex<HashMap<String, Counter>>,
}

struct Counter {
    count: u32,
    window_reset: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
}

impl RateLimiter {
    pub const DEFAULT_CEILING: u32 = 200;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            ceiling,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn standard() -> Self {
        Self::new(Self::DEFAULT_CEILING, Self::DEFAULT_WINDOW)
    }

    /// Count one call for the caller. The first call (or the first after the
    /// window lapsed) resets the counter to 1 and opens a fresh window.
    pub fn check_and_consume(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();

        match counters.get_mut(key) {
            Some(counter) if now < counter.window_reset => {
                if counter.count >= self.ceiling {
                    return Decision {
                        allowed: false,
                        remaining: 0,
                    };
                }
                counter.count += 1;
                Decision {
                    allowed: true,
                    remaining: self.ceiling - counter.count,
                }
            }
            _ => {
                counters.insert(
                    key.to_string(),
                    Counter {
                        count: 1,
                        window_reset: now + self.window,
                    },
                );
                Decision {
                    allowed: true,
                    remaining: self.ceiling.saturating_sub(1),
                }
            }
        }
    }
}
