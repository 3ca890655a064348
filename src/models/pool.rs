use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::route::{OptimizedRoute, SyncState};
use crate::models::vehicle::{GeoPoint, VehicleId, VehicleSummary};

pub const MAX_RIDERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(Uuid);

impl PoolId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PoolId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Waiting,
    Ready,
    InProgress,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Waiting => "waiting",
            PoolStatus::Ready => "ready",
            PoolStatus::InProgress => "in_progress",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub name: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: String,
    pub name: String,
    pub pickup: GeoPoint,
    pub joined_at: DateTime<Utc>,
}

/// A rider as submitted by a caller, before the pool stamps it.
#[derive(Debug, Clone)]
pub struct NewRider {
    pub id: Option<String>,
    pub name: String,
    pub pickup: GeoPoint,
}

/// One shared ride: up to [`MAX_RIDERS`] riders, one vehicle, one destination.
///
/// Lifecycle transitions live in `engine::pool`.
#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) id: PoolId,
    pub(crate) destination: Destination,
    pub(crate) riders: Vec<Rider>,
    pub(crate) vehicle_id: VehicleId,
    pub(crate) status: PoolStatus,
    pub(crate) assigned_vehicle: Option<VehicleSummary>,
    pub(crate) optimized_route: Option<OptimizedRoute>,
    pub(crate) sync_state: Option<SyncState>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Pool {
    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn riders(&self) -> &[Rider] {
        &self.riders
    }

    pub fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }

    pub fn status(&self) -> PoolStatus {
        self.status
    }

    pub fn optimized_route(&self) -> Option<&OptimizedRoute> {
        self.optimized_route.as_ref()
    }

    pub fn sync_state(&self) -> Option<&SyncState> {
        self.sync_state.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_full(&self) -> bool {
        self.riders.len() >= MAX_RIDERS
    }

    pub fn spots_left(&self) -> usize {
        MAX_RIDERS.saturating_sub(self.riders.len())
    }

    /// Waiting with at least one free seat.
    pub fn is_open(&self) -> bool {
        self.status == PoolStatus::Waiting && !self.is_full()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            id: self.id,
            destination: self.destination.clone(),
            riders: self.riders.clone(),
            max_riders: MAX_RIDERS,
            spots_left: self.spots_left(),
            status: self.status,
            created_at: self.created_at,
            vehicle_id: self.vehicle_id,
            assigned_vehicle: self.assigned_vehicle.clone(),
            optimized_route: self.optimized_route.clone(),
            sync_state: self.sync_state.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub destination: Destination,
    pub riders: Vec<Rider>,
    pub max_riders: usize,
    pub spots_left: usize,
    pub status: PoolStatus,
    pub created_at: DateTime<Utc>,
    pub vehicle_id: VehicleId,
    pub assigned_vehicle: Option<VehicleSummary>,
    pub optimized_route: Option<OptimizedRoute>,
    pub sync_state: Option<SyncState>,
}
