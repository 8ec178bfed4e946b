//! Prometheus metrics for provider mirror operations.
//!
//! Counters carry no tenant data (no group IDs, paths or digests), only
//! aggregate outcomes.

use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static VERSION_MIRRORS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_version_mirrors_created_total",
        "Total number of provider version mirrors created",
    )
    .expect("metric creation failed")
});

pub static VERSION_MIRRORS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_version_mirrors_deleted_total",
        "Total number of provider version mirrors deleted",
    )
    .expect("metric creation failed")
});

pub static TRUST_VERIFICATION_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_trust_verification_failures_total",
        "Total checksum manifests rejected by signature verification or parsing",
    )
    .expect("metric creation failed")
});

pub static QUOTA_REJECTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_quota_rejections_total",
        "Total version mirror creations rejected by the per-group limit",
    )
    .expect("metric creation failed")
});

pub static PACKAGES_ADMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_packages_admitted_total",
        "Total installation packages admitted into a mirror",
    )
    .expect("metric creation failed")
});

pub static PACKAGES_REJECTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "depot_packages_rejected_total",
            "Total installation package uploads rejected by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(VERSION_MIRRORS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(VERSION_MIRRORS_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TRUST_VERIFICATION_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(QUOTA_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGES_ADMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGES_REJECTED.clone()))
            .expect("metric registration failed");
    });
}

/// Render every registered metric in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
