use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use crate::models::event::{PoolEvent, PoolEventKind};
use crate::models::pool::PoolId;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired_reservations: usize,
    pub abandoned_pools: Vec<PoolId>,
}

/// Prunes expired or long-completed reservations and abandoned pools as of
/// `now`.
///
/// Holds the coordinator lock for the whole pass, so it never interleaves
/// with a join or leave.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let mut coordinator = state.coordinator.lock().await;

    let expired_reservations = state
        .reservations
        .prune_expired(now, coordinator.settings().completed_retention);
    let abandoned_pools = coordinator.sweep_abandoned(now);

    state
        .metrics
        .expired_reservations_total
        .inc_by(expired_reservations as u64);
    state
        .metrics
        .swept_pools_total
        .inc_by(abandoned_pools.len() as u64);
    state.record_pool_gauges(&coordinator);

    for pool_id in &abandoned_pools {
        state.publish(PoolEvent::new(*pool_id, PoolEventKind::Swept, None, now));
    }

    SweepReport {
        expired_reservations,
        abandoned_pools,
    }
}

pub async fn run_sweeper(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "sweeper started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing is stale at boot.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = sweep(&state, Utc::now()).await;
        info!(
            expired_reservations = report.expired_reservations,
            abandoned_pools = report.abandoned_pools.len(),
            "sweep finished"
        );
    }
}
