use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::campaign::{DeliveryOutcome, Job};

#[derive(Debug, Error, PartialEq)]
pub enum DeliveryConfigError {
    #[error("delay window is inverted: min {min}ms > max {max}ms")]
    InvertedDelayWindow { min: u64, max: u64 },

    #[error("success_ratio must be within 0.0..=1.0, got {0}")]
    InvalidSuccessRatio(f64),
}

/// Tunables for the simulated gateway. The defaults mirror what the real
/// gateway's observed latency and failure rate were eyeballed at; treat them
/// as configuration, not contract.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub success_ratio: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 2_000,
            delay_max_ms: 5_000,
            success_ratio: 0.8,
        }
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), DeliveryConfigError> {
        if self.delay_min_ms > self.delay_max_ms {
            return Err(DeliveryConfigError::InvertedDelayWindow {
                min: self.delay_min_ms,
                max: self.delay_max_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.success_ratio) || self.success_ratio.is_nan() {
            return Err(DeliveryConfigError::InvalidSuccessRatio(self.success_ratio));
        }
        Ok(())
    }
}

/// Seam between the queue and whatever actually transmits messages.
///
/// `schedule` answers how long to wait before this job's outcome becomes
/// known; `resolve` produces the terminal outcome once that wait is over. The
/// simulator below is one implementation; a live gateway client resolving
/// from delivery webhooks is another, keyed by the provider message id it
/// attaches to the job.
pub trait DeliveryBackend: Send + Sync {
    fn schedule(&self, job: &Job) -> Duration;
    fn resolve(&self, job: &Job, body: &str) -> DeliveryOutcome;
}

/// Stand-in for the real gateway: a uniformly random delay inside the
/// configured window, then a probabilistic outcome.
#[derive(Clone, Debug, Default)]
pub struct SimulatedGateway {
    config: DeliveryConfig,
}

impl SimulatedGateway {
    pub fn new(config: DeliveryConfig) -> Result<Self, DeliveryConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }
}

impl DeliveryBackend for SimulatedGateway {
    fn schedule(&self, _job: &Job) -> Duration {
        let mut rng = rand::thread_rng();
        let millis = rng.gen_range(self.config.delay_min_ms..=self.config.delay_max_ms);
        Duration::from_millis(millis)
    }

    fn resolve(&self, _job: &Job, _body: &str) -> DeliveryOutcome {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < self.config.success_ratio {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Failed
        }
    }
}
