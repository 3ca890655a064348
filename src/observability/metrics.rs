use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::engine::registry::StatusCounts;
use crate::error::AppError;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub pool_operations_total: IntCounterVec,
    pub pool_operation_latency_seconds: HistogramVec,
    pub active_pools: IntGaugeVec,
    pub vehicles_reserved_for_pool: IntGauge,
    pub swept_pools_total: IntCounter,
    pub expired_reservations_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let pool_operations_total = IntCounterVec::new(
            Opts::new("pool_operations_total", "Pool operations by operation and outcome"),
            &["operation", "outcome"],
        )
        .expect("valid pool_operations_total metric");

        let pool_operation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "pool_operation_latency_seconds",
                "Latency of pool operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid pool_operation_latency_seconds metric");

        let active_pools = IntGaugeVec::new(
            Opts::new("active_pools", "Pools currently in the registry by status"),
            &["status"],
        )
        .expect("valid active_pools metric");

        let vehicles_reserved_for_pool = IntGauge::new(
            "vehicles_reserved_for_pool",
            "Vehicles currently locked to a pool",
        )
        .expect("valid vehicles_reserved_for_pool metric");

        let swept_pools_total = IntCounter::new(
            "swept_pools_total",
            "Waiting pools removed by the sweep after going stale",
        )
        .expect("valid swept_pools_total metric");

        let expired_reservations_total = IntCounter::new(
            "expired_reservations_total",
            "Reservations pruned after expiry",
        )
        .expect("valid expired_reservations_total metric");

        registry
            .register(Box::new(pool_operations_total.clone()))
            .expect("register pool_operations_total");
        registry
            .register(Box::new(pool_operation_latency_seconds.clone()))
            .expect("register pool_operation_latency_seconds");
        registry
            .register(Box::new(active_pools.clone()))
            .expect("register active_pools");
        registry
            .register(Box::new(vehicles_reserved_for_pool.clone()))
            .expect("register vehicles_reserved_for_pool");
        registry
            .register(Box::new(swept_pools_total.clone()))
            .expect("register swept_pools_total");
        registry
            .register(Box::new(expired_reservations_total.clone()))
            .expect("register expired_reservations_total");

        Self {
            registry,
            pool_operations_total,
            pool_operation_latency_seconds,
            active_pools,
            vehicles_reserved_for_pool,
            swept_pools_total,
            expired_reservations_total,
        }
    }

    /// Counts one operation and its latency, labelled by outcome.
    pub fn observe<T>(&self, operation: &str, elapsed_secs: f64, result: &Result<T, AppError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };

        self.pool_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.pool_operation_latency_seconds
            .with_label_values(&[operation])
            .observe(elapsed_secs);
    }

    pub fn set_active_pools(&self, counts: StatusCounts) {
        self.active_pools
            .with_label_values(&["waiting"])
            .set(counts.waiting as i64);
        self.active_pools
            .with_label_values(&["ready"])
            .set(counts.ready as i64);
        self.active_pools
            .with_label_values(&["in_progress"])
            .set(counts.in_progress as i64);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
