use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Circuit breaker states, grounded in the teacher's reliability module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker configuration, applied per remote-service key (service
/// name or ADES URL) to short-circuit dispatch attempts after repeated
/// adapter-level failures. This complements, but does not replace, the
/// 5-consecutive-soft-failure bound the WPS-1 adapter enforces on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(with = "duration_millis")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 2, reset_timeout: Duration::from_secs(30) }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self { state: CircuitState::Closed, failures: 0, successes: 0, opened_at: None }
    }
}

/// A keyed circuit breaker registry: one breaker per remote-service key.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, entries: Mutex::new(HashMap::new()) }
    }

    /// Whether a dispatch attempt against `key` should proceed. An `Open`
    /// breaker whose reset timeout has elapsed transitions to `HalfOpen` and
    /// allows exactly this one probing attempt through.
    pub fn allow(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if entry.opened_at.map(|t| t.elapsed() >= self.config.reset_timeout).unwrap_or(false) {
                    entry.state = CircuitState::HalfOpen;
                    entry.successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        match entry.state {
            CircuitState::Closed => entry.failures = 0,
            CircuitState::HalfOpen => {
                entry.successes += 1;
                if entry.successes >= self.config.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.failures = 0;
                    entry.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        match entry.state {
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                entry.successes = 0;
            }
            CircuitState::Closed => {
                entry.failures += 1;
                if entry.failures >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        self.entries.lock().unwrap().get(key).map(|e| e.state).unwrap_or(CircuitState::Closed)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 2, ..Default::default() });
        assert!(breaker.allow("svc"));
        breaker.record_failure("svc");
        assert!(breaker.allow("svc"));
        breaker.record_failure("svc");
        assert_eq!(breaker.state("svc"), CircuitState::Open);
        assert!(!breaker.allow("svc"));
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(0),
        });
        breaker.record_failure("svc");
        assert_eq!(breaker.state("svc"), CircuitState::Open);
        assert!(breaker.allow("svc")); // reset_timeout elapsed instantly -> half-open
        breaker.record_success("svc");
        assert_eq!(breaker.state("svc"), CircuitState::HalfOpen);
        breaker.record_success("svc");
        assert_eq!(breaker.state("svc"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(0),
        });
        breaker.record_failure("svc");
        assert!(breaker.allow("svc"));
        breaker.record_failure("svc");
        assert_eq!(breaker.state("svc"), CircuitState::Open);
    }
}
