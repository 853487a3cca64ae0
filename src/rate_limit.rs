/// Abuse rate limiting.
///
/// Three named policies (login, general api, password reset), each counting
/// consumptions per identifier inside a rolling window, with an optional
/// extended block once the budget is exhausted. Counters live behind the
/// `CounterStore` trait; the in-memory store is the default and a shared
/// store can be substituted without touching call sites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::configuration::{PolicySettings, RateLimitSettings};

/// A named rate-limit policy.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    pub name: &'static str,
    /// Consumptions allowed per window.
    pub points: u32,
    pub window: Duration,
    /// Extended block applied once the budget is exceeded.
    pub block: Option<Duration>,
}

impl RatePolicy {
    fn from_settings(name: &'static str, settings: &PolicySettings) -> Self {
        Self {
            name,
            points: settings.points,
            window: Duration::from_secs(settings.window_seconds),
            block: settings.block_seconds.map(Duration::from_secs),
        }
    }
}

/// Outcome of a consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub allowed: bool,
    pub remaining_points: u32,
    /// When denied: milliseconds until points free up (window rollover or
    /// block expiry). Zero when allowed.
    pub ms_before_next: u64,
    pub consumed_points: u32,
}

/// Counter storage contract: consume and reset must be atomic per
/// (policy, identifier) pair.
pub trait CounterStore: Send + Sync {
    fn consume(&self, policy: &RatePolicy, identifier: &str) -> ConsumeOutcome;
    fn reset(&self, policy: &RatePolicy, identifier: &str);
}

struct Counter {
    consumed: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
}

/// Process-local counter store. Each consumption runs as a single locked
/// increment-and-compare, so concurrent requests sharing an identifier can
/// never jointly exceed the budget.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<(String, String), Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn consume(&self, policy: &RatePolicy, identifier: &str) -> ConsumeOutcome {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();

        let counter = counters
            .entry((policy.name.to_string(), identifier.to_string()))
            .or_insert(Counter {
                consumed: 0,
                window_start: now,
                blocked_until: None,
            });

        if let Some(until) = counter.blocked_until {
            if now < until {
                return ConsumeOutcome {
                    allowed: false,
                    remaining_points: 0,
                    ms_before_next: until.duration_since(now).as_millis() as u64,
                    consumed_points: counter.consumed,
                };
            }
            // Block expired; the identifier starts over.
            counter.blocked_until = None;
            counter.consumed = 0;
            counter.window_start = now;
        }

        if now.duration_since(counter.window_start) >= policy.window {
            counter.consumed = 0;
            counter.window_start = now;
        }

        if counter.consumed < policy.points {
            counter.consumed += 1;
            return ConsumeOutcome {
                allowed: true,
                remaining_points: policy.points - counter.consumed,
                ms_before_next: 0,
                consumed_points: counter.consumed,
            };
        }

        let ms_before_next = match policy.block {
            Some(block) => {
                counter.blocked_until = Some(now + block);
                tracing::warn!(
                    policy = policy.name,
                    identifier = identifier,
                    block_ms = block.as_millis() as u64,
                    "Rate limit exceeded, identifier blocked"
                );
                block.as_millis() as u64
            }
            None => {
                let elapsed = now.duration_since(counter.window_start);
                policy.window.saturating_sub(elapsed).as_millis() as u64
            }
        };

        ConsumeOutcome {
            allowed: false,
            remaining_points: 0,
            ms_before_next,
            consumed_points: counter.consumed,
        }
    }

    fn reset(&self, policy: &RatePolicy, identifier: &str) {
        let mut counters = self.counters.lock().unwrap();
        counters.remove(&(policy.name.to_string(), identifier.to_string()));
    }
}

/// The three application policies bound to a counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    pub login: RatePolicy,
    pub api: RatePolicy,
    pub password_reset: RatePolicy,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self::with_store(settings, Arc::new(InMemoryCounterStore::new()))
    }

    pub fn with_store(settings: &RateLimitSettings, store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            login: RatePolicy::from_settings("login", &settings.login),
            api: RatePolicy::from_settings("api", &settings.api),
            password_reset: RatePolicy::from_settings("password_reset", &settings.password_reset),
        }
    }

    pub fn consume_login(&self, identifier: &str) -> ConsumeOutcome {
        self.store.consume(&self.login, identifier)
    }

    pub fn consume_api(&self, identifier: &str) -> ConsumeOutcome {
        self.store.consume(&self.api, identifier)
    }

    pub fn consume_password_reset(&self, identifier: &str) -> ConsumeOutcome {
        self.store.consume(&self.password_reset, identifier)
    }

    /// Clear the login counter after a successful login, so a legitimate
    /// user is not penalized for earlier failed attempts.
    pub fn reset_login(&self, identifier: &str) {
        self.store.reset(&self.login, identifier);
    }
}
