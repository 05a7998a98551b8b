//! Shared engine context: limits, defaults and metrics.

use archpol_config::{EngineConfig, EngineLimits, WizardDefaults};
use archpol_telemetry::Metrics;
use tracing::debug;

use crate::error::PolicyError;

/// Configuration and metrics handed to every step handler.
#[derive(Clone)]
pub struct EngineContext {
    config: EngineConfig,
    metrics: Metrics,
}

impl EngineContext {
    /// Bundle configuration with a metrics registry.
    #[must_use]
    pub const fn new(config: EngineConfig, metrics: Metrics) -> Self {
        Self { config, metrics }
    }

    /// Hard validation limits.
    #[must_use]
    pub const fn limits(&self) -> &EngineLimits {
        &self.config.limits
    }

    /// Defaults for omitted input.
    #[must_use]
    pub const fn defaults(&self) -> &WizardDefaults {
        &self.config.defaults
    }

    /// Metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Count a rejected field. Other error classes are counted where they
    /// are resolved.
    pub fn record(&self, err: &PolicyError) {
        if let PolicyError::InvalidField { field, issue, .. } = err {
            debug!(field = field.as_str(), issue = issue.as_str(), "field rejected");
            self.metrics
                .inc_validation_failure(field.as_str(), issue.as_str());
        }
    }
}
