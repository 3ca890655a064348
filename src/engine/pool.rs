use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::directory::VehicleDirectory;
use crate::engine::route::optimize_route;
use crate::engine::sync::synchronize;
use crate::error::AppError;
use crate::models::pool::{Destination, NewRider, Pool, PoolId, PoolStatus, Rider, MAX_RIDERS};
use crate::models::vehicle::VehicleId;

impl Pool {
    /// Opens a waiting pool and locks its vehicle against solo booking
    /// straight away, before any rider has joined.
    pub fn create(
        destination: Destination,
        vehicle_id: VehicleId,
        vehicles: &mut VehicleDirectory,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let id = PoolId::new();
        vehicles.require_mut(vehicle_id)?.lock_for_pool(id, now);

        info!(pool_id = %id, vehicle_id, destination = %destination.name, "pool created");

        Ok(Self {
            id,
            destination,
            riders: Vec::with_capacity(MAX_RIDERS),
            vehicle_id,
            status: PoolStatus::Waiting,
            assigned_vehicle: None,
            optimized_route: None,
            sync_state: None,
            created_at: now,
        })
    }

    /// Admits a rider. The admission that fills the pool moves it to
    /// `Ready` and computes the route and sync plan.
    pub fn add_rider(
        &mut self,
        rider: NewRider,
        vehicles: &mut VehicleDirectory,
        now: DateTime<Utc>,
    ) -> Result<&Rider, AppError> {
        if self.is_full() {
            return Err(AppError::CapacityExceeded {
                subject: format!("pool {}", self.id),
                count: self.riders.len(),
                capacity: MAX_RIDERS,
            });
        }
        if self.status != PoolStatus::Waiting {
            return Err(AppError::InvalidState(format!(
                "pool {} is {} and no longer accepting riders",
                self.id,
                self.status.as_str()
            )));
        }
        if let Some(id) = rider.id.as_deref() {
            if self.riders.iter().any(|r| r.id == id) {
                return Err(AppError::InvalidState(format!(
                    "rider {id} is already in pool {}",
                    self.id
                )));
            }
        }

        let vehicle = vehicles.require_mut(self.vehicle_id)?;
        if vehicle.is_full() {
            return Err(AppError::CapacityExceeded {
                subject: format!("vehicle {}", vehicle.id),
                count: usize::from(vehicle.passenger_count),
                capacity: usize::from(vehicle.max_capacity),
            });
        }

        self.riders.push(Rider {
            id: rider
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(generate_rider_id),
            name: rider.name,
            pickup: rider.pickup,
            joined_at: now,
        });

        vehicle.passenger_count = self.riders.len() as u8;
        vehicle.last_update = now;

        if self.is_full() {
            self.status = PoolStatus::Ready;
            self.assign_optimal_vehicle(vehicles, now)?;
        }

        self.riders
            .last()
            .ok_or_else(|| AppError::Internal("rider vanished after admission".to_string()))
    }

    fn assign_optimal_vehicle(
        &mut self,
        vehicles: &mut VehicleDirectory,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let vehicle = vehicles.require_mut(self.vehicle_id)?;

        let route = optimize_route(vehicle, &self.riders, &self.destination);
        let plan = synchronize(&route, vehicle, &self.riders, &self.destination, now);

        self.assigned_vehicle = Some(vehicle.summary());
        self.optimized_route = Some(plan.route);
        self.sync_state = Some(plan.state);

        vehicle.seal_for_pool(self.id, now);

        info!(
            pool_id = %self.id,
            vehicle_id = self.vehicle_id,
            mode = ?self.sync_state.as_ref().map(|s| s.mode),
            total_minutes = self.sync_state.as_ref().map(|s| s.total_time_minutes),
            "pool ready"
        );

        Ok(())
    }

    /// Drops a rider from a waiting pool and returns how many remain.
    ///
    /// When the last rider leaves, the vehicle is handed back fully
    /// unlocked; the caller removes the pool from its registry.
    pub fn remove_rider(
        &mut self,
        rider_id: &str,
        vehicles: &mut VehicleDirectory,
        now: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        if self.status != PoolStatus::Waiting {
            return Err(AppError::InvalidState(format!(
                "cannot leave pool {} while it is {}",
                self.id,
                self.status.as_str()
            )));
        }

        let index = self
            .riders
            .iter()
            .position(|r| r.id == rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not in pool {}", self.id)))?;
        self.riders.remove(index);

        if let Some(vehicle) = vehicles.get_mut(self.vehicle_id) {
            if self.riders.is_empty() {
                vehicle.release_pool_lock(now);
            } else {
                vehicle.passenger_count = self.riders.len() as u8;
                vehicle.last_update = now;
            }
        }

        info!(pool_id = %self.id, rider_id, remaining = self.riders.len(), "rider left pool");
        Ok(self.riders.len())
    }

    /// Marks a full pool as underway. Repeating the call only re-asserts the
    /// vehicle lock.
    pub fn start(&mut self, vehicles: &mut VehicleDirectory, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.is_full() {
            return Err(AppError::InvalidState(format!(
                "pool {} is not full yet ({}/{MAX_RIDERS} riders)",
                self.id,
                self.riders.len()
            )));
        }

        self.status = PoolStatus::InProgress;
        if let Some(vehicle) = vehicles.get_mut(self.vehicle_id) {
            vehicle.seal_for_pool(self.id, now);
        }

        info!(pool_id = %self.id, vehicle_id = self.vehicle_id, "pool ride started");
        Ok(())
    }

    /// Hands the vehicle back when the pool is discarded.
    pub fn release_vehicle(&self, vehicles: &mut VehicleDirectory, now: DateTime<Utc>) {
        if let Some(vehicle) = vehicles.get_mut(self.vehicle_id) {
            if vehicle.pool_id() == Some(self.id) {
                vehicle.release_pool_lock(now);
            }
        }
    }
}

fn generate_rider_id() -> String {
    format!("rider_{}", Uuid::new_v4().simple())
}
