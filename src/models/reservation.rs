use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::pool::{Destination, PoolId, Rider};
use crate::models::route::{OptimizedRoute, SyncState};
use crate::models::vehicle::{GeoPoint, VehicleId, VehicleSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Reserved,
    Ready,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationKind {
    #[serde(rename_all = "camelCase")]
    Solo {
        user_name: String,
        passenger_count: u8,
        pickup: GeoPoint,
        destination: GeoPoint,
    },
    #[serde(rename = "keke_pool", rename_all = "camelCase")]
    Pool {
        pool_id: PoolId,
        destination: Destination,
        riders: Vec<Rider>,
        optimized_route: Option<OptimizedRoute>,
        sync_state: Option<SyncState>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub vehicle_id: VehicleId,
    pub vehicle: VehicleSummary,
    pub status: ReservationStatus,
    pub kind: ReservationKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn pool_id(&self) -> Option<PoolId> {
        match &self.kind {
            ReservationKind::Pool { pool_id, .. } => Some(*pool_id),
            ReservationKind::Solo { .. } => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Survives the expiry sweep regardless of `expires_at`.
    pub fn is_pinned(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::Completed | ReservationStatus::InProgress
        )
    }
}

/// A reservation as returned to a polling client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub is_valid: bool,
    pub expires_in: i64,
}
