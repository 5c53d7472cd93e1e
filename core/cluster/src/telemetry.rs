//! Telemetry related to cluster-wide cache invalidation.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::Opts;

/// Number of identity cache invalidations broadcast to the cluster.
pub static INVALIDATION_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "authcore_cluster_invalidation_count",
            "Number of identity cache invalidations broadcast to the cluster",
        ),
        &["kind"],
    )
    .expect("failed to initialise INVALIDATION_COUNT counter")
});

/// Number of cluster peers that failed to refresh their identity cache.
pub static INVALIDATION_PEER_ERR: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "authcore_cluster_invalidation_peer_error",
        "Number of cluster peers that failed to refresh their identity cache",
    )
    .expect("failed to initialise INVALIDATION_PEER_ERR counter")
});

/// Ensure metrics are registered only once.
static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// The first time this method is called it will register the cluster invalidation metrics.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 2] = [
        Box::new(INVALIDATION_COUNT.clone()),
        Box::new(INVALIDATION_PEER_ERR.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}
