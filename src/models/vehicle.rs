use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::pool::PoolId;

pub type VehicleId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A tricycle in the directory.
///
/// The pool-lock pair (`reserved_for_pool`, `pool_id`) is only written through
/// [`Vehicle::lock_for_pool`], [`Vehicle::seal_for_pool`] and
/// [`Vehicle::release_pool_lock`], so `pool_id` is set exactly when
/// `reserved_for_pool` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub location: GeoPoint,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub battery: u8,
    pub max_capacity: u8,
    #[serde(default)]
    pub passenger_count: u8,
    #[serde(default)]
    pub color: String,
    #[serde(default = "Utc::now")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub trips_today: u32,
    #[serde(default)]
    reserved_for_pool: bool,
    #[serde(default)]
    pool_id: Option<PoolId>,
    #[serde(default)]
    pub reserved_by: Option<String>,
    #[serde(default)]
    pub reserved_at: Option<DateTime<Utc>>,
}

fn default_kind() -> String {
    "tricycle".to_string()
}

fn default_available() -> bool {
    true
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        name: impl Into<String>,
        location: GeoPoint,
        speed: f64,
        max_capacity: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: default_kind(),
            location,
            available: true,
            battery: 100,
            max_capacity,
            passenger_count: 0,
            color: String::new(),
            last_update: now,
            driver: String::new(),
            phone: String::new(),
            speed,
            rating: 0.0,
            trips_today: 0,
            reserved_for_pool: false,
            pool_id: None,
            reserved_by: None,
            reserved_at: None,
        }
    }

    pub fn reserved_for_pool(&self) -> bool {
        self.reserved_for_pool
    }

    pub fn pool_id(&self) -> Option<PoolId> {
        self.pool_id
    }

    pub fn is_full(&self) -> bool {
        self.passenger_count >= self.max_capacity
    }

    pub fn available_seats(&self) -> u8 {
        self.max_capacity.saturating_sub(self.passenger_count)
    }

    /// Bookable by a solo rider right now.
    pub fn is_open_for_solo(&self) -> bool {
        self.available && !self.is_full() && !self.reserved_for_pool
    }

    /// Attach to a waiting pool. Stays `available` so more riders can be
    /// routed to it, but solo booking is refused from here on.
    pub fn lock_for_pool(&mut self, pool_id: PoolId, now: DateTime<Utc>) {
        self.reserved_for_pool = true;
        self.pool_id = Some(pool_id);
        self.last_update = now;
    }

    /// Full lock once the pool is ready or running.
    pub fn seal_for_pool(&mut self, pool_id: PoolId, now: DateTime<Utc>) {
        self.reserved_for_pool = true;
        self.pool_id = Some(pool_id);
        self.available = false;
        self.last_update = now;
    }

    /// Detach from any pool and return to an empty, bookable vehicle.
    pub fn release_pool_lock(&mut self, now: DateTime<Utc>) {
        self.reserved_for_pool = false;
        self.pool_id = None;
        self.available = true;
        self.passenger_count = 0;
        self.last_update = now;
    }

    pub fn summary(&self) -> VehicleSummary {
        VehicleSummary {
            id: self.id,
            name: self.name.clone(),
            driver: self.driver.clone(),
            phone: self.phone.clone(),
            location: self.location,
            speed: self.speed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub name: String,
    pub driver: String,
    pub phone: String,
    pub location: GeoPoint,
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyVehicle {
    pub id: VehicleId,
    pub name: String,
    pub location: GeoPoint,
    pub distance: f64,
    pub eta: u32,
    pub battery: u8,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub passenger_count: u8,
    pub max_capacity: u8,
    pub available_seats: u8,
    pub driver: String,
    pub phone: String,
    pub rating: f64,
    pub available: bool,
    pub reserved_for_pool: bool,
    pub pool_id: Option<PoolId>,
    pub last_update: DateTime<Utc>,
}
