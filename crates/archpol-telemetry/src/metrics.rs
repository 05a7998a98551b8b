//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters relevant to policy validation and submission.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by the engine and its front ends.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    validation_failures_total: IntCounterVec,
    // Unlabelled running total kept outside the registry for snapshots.
    validation_failures_seen: IntCounter,
    policy_submissions_total: IntCounterVec,
    pool_catalog_degraded_total: IntCounter,
    pools_created_total: IntCounter,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Total field validation failures across all fields.
    pub validation_failures_total: u64,
    /// Policies accepted by the archive manager without caveats.
    pub policies_created_total: u64,
    /// Policies accepted with backend warnings.
    pub policies_warned_total: u64,
    /// Policy submissions rejected by the archive manager.
    pub policies_failed_total: u64,
    /// Times the pool catalog was unavailable and an empty catalog was used.
    pub pool_catalog_degraded_total: u64,
    /// Volume pools created.
    pub pools_created_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let validation_failures_total = IntCounterVec::new(
            Opts::new(
                "archpol_validation_failures_total",
                "Field validation failures by field and issue",
            ),
            &["field", "issue"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "archpol_validation_failures_total",
            source,
        })?;
        let validation_failures_seen = IntCounter::new(
            "archpol_validation_failures_seen",
            "Field validation failures across all fields",
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "archpol_validation_failures_seen",
            source,
        })?;
        let policy_submissions_total = IntCounterVec::new(
            Opts::new(
                "archpol_policy_submissions_total",
                "Archive policy submissions by outcome",
            ),
            &["outcome"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "archpol_policy_submissions_total",
            source,
        })?;
        let pool_catalog_degraded_total = IntCounter::with_opts(Opts::new(
            "archpol_pool_catalog_degraded_total",
            "Pool catalog lookups that fell back to an empty catalog",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "archpol_pool_catalog_degraded_total",
            source,
        })?;
        let pools_created_total = IntCounter::with_opts(Opts::new(
            "archpol_pools_created_total",
            "Volume pools created",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "archpol_pools_created_total",
            source,
        })?;

        register(&registry, "archpol_validation_failures_total", &validation_failures_total)?;
        register(&registry, "archpol_policy_submissions_total", &policy_submissions_total)?;
        register(
            &registry,
            "archpol_pool_catalog_degraded_total",
            &pool_catalog_degraded_total,
        )?;
        register(&registry, "archpol_pools_created_total", &pools_created_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                validation_failures_total,
                validation_failures_seen,
                policy_submissions_total,
                pool_catalog_degraded_total,
                pools_created_total,
            }),
        })
    }

    /// Increment the validation failure counter for a field and issue.
    pub fn inc_validation_failure(&self, field: &str, issue: &str) {
        self.inner
            .validation_failures_total
            .with_label_values(&[field, issue])
            .inc();
        self.inner.validation_failures_seen.inc();
    }

    /// Increment the submission counter for an outcome (`created`, `warning`, `failed`).
    pub fn inc_policy_submission(&self, outcome: &str) {
        self.inner
            .policy_submissions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record that the pool catalog was unavailable.
    pub fn inc_pool_catalog_degraded(&self) {
        self.inner.pool_catalog_degraded_total.inc();
    }

    /// Record a created volume pool.
    pub fn inc_pool_created(&self) {
        self.inner.pools_created_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let submissions = &self.inner.policy_submissions_total;
        MetricsSnapshot {
            validation_failures_total: self.inner.validation_failures_seen.get(),
            policies_created_total: submissions.with_label_values(&["created"]).get(),
            policies_warned_total: submissions.with_label_values(&["warning"]).get(),
            policies_failed_total: submissions.with_label_values(&["failed"]).get(),
            pool_catalog_degraded_total: self.inner.pool_catalog_degraded_total.get(),
            pools_created_total: self.inner.pools_created_total.get(),
        }
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
