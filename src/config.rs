//! Runtime configuration for the guard and its serialisation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    backend::ModelArtefact,
    encoder::{DEFAULT_MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH},
    orchestrator::DEFAULT_QUIET_PERIOD,
    service::ServiceConfig,
};

/// Tunables shared by the service and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Encoded sequence length, including the two framing tokens.
    pub max_sequence_length: usize,
    /// Quiet period before a text change is classified.
    pub debounce_ms: u64,
    /// Device id bound by default; the first enumerated device when unset.
    pub preferred_device: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            debounce_ms: u64::try_from(DEFAULT_QUIET_PERIOD.as_millis()).unwrap_or(u64::MAX),
            preferred_device: None,
        }
    }
}

impl GuardConfig {
    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_sequence_length` cannot hold the framing
    /// tokens or `debounce_ms` is zero.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, String> {
        if self.max_sequence_length < MIN_SEQUENCE_LENGTH {
            Err(format!(
                "max_sequence_length must be at least {MIN_SEQUENCE_LENGTH}"
            ))
        } else if self.debounce_ms == 0 {
            Err("debounce_ms must be greater than 0".into())
        } else {
            Ok(self)
        }
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Service settings for `model`.
    #[must_use]
    pub fn service_config(&self, model: ModelArtefact) -> ServiceConfig {
        ServiceConfig {
            model,
            max_sequence_length: self.max_sequence_length,
            preferred_device: self.preferred_device.clone(),
        }
    }
}
