use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::pool::{PoolId, PoolSnapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolEventKind {
    Created,
    RiderJoined,
    Ready,
    RiderLeft,
    Deleted,
    Started,
    Swept,
    Completed,
}

/// Broadcast to WebSocket subscribers whenever a pool changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEvent {
    pub pool_id: PoolId,
    pub kind: PoolEventKind,
    pub pool: Option<PoolSnapshot>,
    pub at: DateTime<Utc>,
}

impl PoolEvent {
    pub fn new(pool_id: PoolId, kind: PoolEventKind, pool: Option<PoolSnapshot>, at: DateTime<Utc>) -> Self {
        Self {
            pool_id,
            kind,
            pool,
            at,
        }
    }
}
