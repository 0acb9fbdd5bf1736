use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crawl_core::ConfigError;
use rand::Rng;
use tokio::time::Instant;

type DomainGate = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Per-domain pacing. Callers for one domain serialize through that domain's
/// gate; gates for different domains never block each other.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    jitter: f64,
    gates: Mutex<HashMap<String, DomainGate>>,
}

impl RateLimiter {
    /// `jitter` is the fraction of `interval` each wait may vary by, in
    /// `0.0..1.0`.
    pub fn new(interval: Duration, jitter: f64) -> Result<Self, ConfigError> {
        if !jitter.is_finite() || !(0.0..1.0).contains(&jitter) {
            return Err(ConfigError::RateLimiterMisconfiguration(format!(
                "jitter {jitter} must be within 0.0..1.0"
            )));
        }
        Ok(Self {
            interval,
            jitter,
            gates: Mutex::new(HashMap::new()),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Smallest gap two requests to one domain can have.
    pub fn min_gap(&self) -> Duration {
        self.interval.mul_f64(1.0 - self.jitter)
    }

    /// Wait until a request to `domain` is permitted, then claim the slot.
    pub async fn acquire(&self, domain: &str) {
        let gate = self.gate(domain);
        let mut last = gate.lock().await;
        if let Some(previous) = *last {
            let ready = previous + self.jittered_interval();
            tokio::time::sleep_until(ready).await;
        }
        *last = Some(Instant::now());
    }

    fn gate(&self, domain: &str) -> DomainGate {
        let mut gates = match self.gates.lock() {
            Ok(gates) => gates,
            Err(poisoned) => poisoned.into_inner(),
        };
        gates
            .entry(domain.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    fn jittered_interval(&self) -> Duration {
        if self.interval.is_zero() || self.jitter == 0.0 {
            return self.interval;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        self.interval.mul_f64(factor)
    }
}
