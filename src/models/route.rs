use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::pool::Destination;
use crate::models::vehicle::{GeoPoint, VehicleSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PickupMode {
    /// Everyone boards at one shared point.
    Group,
    /// The vehicle visits each pickup in turn.
    Staggered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub rider_id: String,
    pub name: String,
    pub pickup: GeoPoint,
    pub pickup_order: u32,
    /// Straight-line distance from the vehicle's starting position.
    pub distance_km: f64,
    pub eta: u32,
    #[serde(rename = "cumulativeETA")]
    pub cumulative_eta: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedRoute {
    pub vehicle: VehicleSummary,
    pub destination: Destination,
    pub mode: Option<PickupMode>,
    pub estimated_pickup_order: Vec<RouteStop>,
    #[serde(rename = "sharedPickupETA")]
    pub shared_pickup_eta: Option<u32>,
    pub total_time: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickupPlanEntry {
    pub rider_id: String,
    pub rider_name: String,
    pub pickup_order: u32,
    pub leg_eta_minutes: u32,
    #[serde(rename = "cumulativeETA")]
    pub cumulative_eta: u32,
    pub eta_at: DateTime<Utc>,
    pub pickup: GeoPoint,
}

/// The time-anchored pickup plan handed to every rider of a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub generated_at: DateTime<Utc>,
    pub ride_start_at: DateTime<Utc>,
    pub same_pickup_location: bool,
    pub mode: PickupMode,
    /// Ceiling of the unfloored route time. In staggered mode this can be
    /// below the last stop's floored `cumulative_eta`, so
    /// `estimated_arrival_at` may precede the last pickup's `eta_at`.
    pub total_time_minutes: u32,
    pub estimated_arrival_at: DateTime<Utc>,
    pub pickup_plan: Vec<PickupPlanEntry>,
}
