use tokio::sync::{broadcast, Mutex};

use crate::engine::coordinator::{PoolCoordinator, PoolSettings};
use crate::engine::directory::VehicleDirectory;
use crate::engine::reservations::ReservationBook;
use crate::models::event::PoolEvent;
use crate::observability::metrics::Metrics;

/// Shared application state.
///
/// The coordinator sits behind one mutex so pool requests and the sweep never
/// interleave. Reservations are independent records and live in their own
/// concurrent map.
pub struct AppState {
    pub coordinator: Mutex<PoolCoordinator>,
    pub reservations: ReservationBook,
    pub pool_events_tx: broadcast::Sender<PoolEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(vehicles: VehicleDirectory, settings: PoolSettings, event_buffer_size: usize) -> Self {
        let (pool_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            coordinator: Mutex::new(PoolCoordinator::new(vehicles, settings)),
            reservations: ReservationBook::new(),
            pool_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn publish(&self, event: PoolEvent) {
        // No subscribers is not an error.
        let _ = self.pool_events_tx.send(event);
    }

    /// Refreshes the pool gauges from the registry.
    pub fn record_pool_gauges(&self, coordinator: &PoolCoordinator) {
        let counts = coordinator.pools().status_counts();
        self.metrics.set_active_pools(counts);
        self.metrics
            .vehicles_reserved_for_pool
            .set(coordinator.vehicles().reserved_for_pool_count() as i64);
    }
}
