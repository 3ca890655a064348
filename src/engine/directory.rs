use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::AppError;
use crate::geo::{eta_minutes, haversine_km, MIN_LEG_MINUTES};
use crate::models::vehicle::{GeoPoint, NearbyVehicle, Vehicle, VehicleId};

pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 2.0;

/// The fleet known to this process, keyed by vehicle id.
#[derive(Debug, Clone, Default)]
pub struct VehicleDirectory {
    vehicles: BTreeMap<VehicleId, Vehicle>,
}

impl VehicleDirectory {
    pub fn new(fleet: impl IntoIterator<Item = Vehicle>, now: DateTime<Utc>) -> Self {
        let mut vehicles = BTreeMap::new();
        for mut vehicle in fleet {
            // No pool survives a restart, so neither can a pool lock.
            if vehicle.reserved_for_pool() || vehicle.pool_id().is_some() {
                warn!(vehicle_id = vehicle.id, "dropping stale pool lock from fleet entry");
                vehicle.release_pool_lock(now);
            }
            vehicles.insert(vehicle.id, vehicle);
        }
        Self { vehicles }
    }

    pub fn with_default_fleet(now: DateTime<Utc>) -> Self {
        Self::new(default_fleet(now), now)
    }

    pub fn load(path: &Path, now: DateTime<Utc>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Internal(format!("failed to read fleet file {}: {err}", path.display()))
        })?;
        let fleet: Vec<Vehicle> = serde_json::from_str(&raw).map_err(|err| {
            AppError::Internal(format!("invalid fleet file {}: {err}", path.display()))
        })?;

        info!(path = %path.display(), vehicles = fleet.len(), "fleet loaded");
        Ok(Self::new(fleet, now))
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn require(&self, id: VehicleId) -> Result<&Vehicle, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id} not found")))
    }

    pub fn require_mut(&mut self, id: VehicleId) -> Result<&mut Vehicle, AppError> {
        self.get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {id} not found")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn list(&self) -> Vec<Vehicle> {
        self.vehicles.values().cloned().collect()
    }

    /// Vehicles a solo rider could book right now.
    pub fn available(&self) -> Vec<Vehicle> {
        self.vehicles
            .values()
            .filter(|v| v.is_open_for_solo())
            .cloned()
            .collect()
    }

    /// Non-full vehicles within `radius_km` of `origin`, nearest first.
    ///
    /// Pool-locked vehicles are included so clients can offer pool mode on them.
    pub fn nearby(&self, origin: &GeoPoint, radius_km: f64) -> Vec<NearbyVehicle> {
        let mut nearby: Vec<NearbyVehicle> = self
            .vehicles
            .values()
            .filter(|v| !v.is_full())
            .filter_map(|v| {
                let distance = haversine_km(origin, &v.location);
                if distance > radius_km {
                    return None;
                }

                Some(NearbyVehicle {
                    id: v.id,
                    name: v.name.clone(),
                    location: v.location,
                    distance: round2(distance),
                    eta: eta_minutes(distance, v.speed, MIN_LEG_MINUTES),
                    battery: v.battery,
                    color: v.color.clone(),
                    kind: v.kind.clone(),
                    passenger_count: v.passenger_count,
                    max_capacity: v.max_capacity,
                    available_seats: v.available_seats(),
                    driver: v.driver.clone(),
                    phone: v.phone.clone(),
                    rating: v.rating,
                    available: v.available,
                    reserved_for_pool: v.reserved_for_pool(),
                    pool_id: v.pool_id(),
                    last_update: v.last_update,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        nearby
    }

    pub fn reserved_for_pool_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.reserved_for_pool()).count()
    }

    pub fn full_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.is_full()).count()
    }

    pub fn open_for_solo_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.is_open_for_solo()).count()
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct FleetEntry {
    id: VehicleId,
    lat: f64,
    lng: f64,
    battery: u8,
    color: &'static str,
    driver: &'static str,
    phone: &'static str,
    speed: f64,
    rating: f64,
    trips_today: u32,
}

const DEFAULT_FLEET: [FleetEntry; 6] = [
    FleetEntry { id: 1, lat: 6.89277, lng: 3.71827, battery: 92, color: "Blue", driver: "John Okafor", phone: "+234 803 123 4567", speed: 15.0, rating: 4.8, trips_today: 12 },
    FleetEntry { id: 2, lat: 6.89509, lng: 3.72761, battery: 78, color: "Red", driver: "Michael Obi", phone: "+234 803 234 5678", speed: 12.0, rating: 4.6, trips_today: 8 },
    FleetEntry { id: 3, lat: 6.89286, lng: 3.72351, battery: 65, color: "Green", driver: "Sunday Eze", phone: "+234 803 345 6789", speed: 10.0, rating: 4.9, trips_today: 15 },
    FleetEntry { id: 4, lat: 6.88884, lng: 3.72281, battery: 85, color: "Yellow", driver: "Chidi Nwosu", phone: "+234 803 456 7890", speed: 14.0, rating: 4.7, trips_today: 10 },
    FleetEntry { id: 5, lat: 6.89069, lng: 3.72622, battery: 45, color: "Blue", driver: "Emeka Okonkwo", phone: "+234 803 567 8901", speed: 11.0, rating: 4.5, trips_today: 6 },
    FleetEntry { id: 6, lat: 6.89471, lng: 3.72230, battery: 88, color: "Red", driver: "Ifeanyi Ade", phone: "+234 803 678 9012", speed: 13.0, rating: 4.8, trips_today: 14 },
];

/// Six campus tricycles, four seats each.
pub fn default_fleet(now: DateTime<Utc>) -> Vec<Vehicle> {
    DEFAULT_FLEET
        .iter()
        .map(|entry| {
            let mut vehicle = Vehicle::new(
                entry.id,
                format!("Tricycle #{:03}", entry.id),
                GeoPoint::new(entry.lat, entry.lng),
                entry.speed,
                4,
                now,
            );
            vehicle.battery = entry.battery;
            vehicle.color = entry.color.to_string();
            vehicle.driver = entry.driver.to_string();
            vehicle.phone = entry.phone.to_string();
            vehicle.rating = entry.rating;
            vehicle.trips_today = entry.trips_today;
            vehicle
        })
        .collect()
}
