use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::booking::{self, EtaQuote, EtaRequest, ReleaseOutcome, ReserveRequest};
use crate::engine::directory::VehicleDirectory;
use crate::engine::registry::PoolRegistry;
use crate::engine::reservations::pool_reservation;
use crate::error::AppError;
use crate::models::pool::{Destination, NewRider, Pool, PoolId, PoolSnapshot, PoolStatus};
use crate::models::reservation::Reservation;
use crate::models::vehicle::{GeoPoint, VehicleId};

/// Timeouts applied by the coordinator and the sweep.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub reservation_ttl: Duration,
    pub abandoned_pool_ttl: Duration,
    /// How long completed reservations stay queryable before the sweep drops them.
    pub completed_retention: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::minutes(15),
            abandoned_pool_ttl: Duration::minutes(30),
            completed_retention: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub pool_id: Option<PoolId>,
    pub rider_id: Option<String>,
    pub rider_name: String,
    pub pickup: GeoPoint,
    pub destination: Destination,
    pub vehicle_id: Option<VehicleId>,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub pool: PoolSnapshot,
    pub rider_id: String,
    pub created: bool,
    /// Present only on the admission that filled the pool.
    pub reservation: Option<Reservation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LeaveOutcome {
    Left { pool: PoolSnapshot },
    Deleted { pool_id: PoolId },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRide {
    pub vehicle_id: VehicleId,
    pub closed_pool: Option<PoolId>,
}

/// Owns the vehicle directory and the pool registry; every pool operation
/// runs through here so the two stay consistent.
#[derive(Debug)]
pub struct PoolCoordinator {
    vehicles: VehicleDirectory,
    pools: PoolRegistry,
    settings: PoolSettings,
}

impl PoolCoordinator {
    pub fn new(vehicles: VehicleDirectory, settings: PoolSettings) -> Self {
        Self {
            vehicles,
            pools: PoolRegistry::new(),
            settings,
        }
    }

    pub fn vehicles(&self) -> &VehicleDirectory {
        &self.vehicles
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    pub fn find_open_pool(&self, destination_name: &str) -> Option<PoolSnapshot> {
        self.pools.find_open(destination_name).map(Pool::snapshot)
    }

    pub fn get_pool(&self, pool_id: PoolId) -> Result<PoolSnapshot, AppError> {
        self.pools
            .get(pool_id)
            .map(Pool::snapshot)
            .ok_or_else(|| pool_not_found(pool_id))
    }

    pub fn join_pool(&mut self, request: JoinRequest, now: DateTime<Utc>) -> Result<JoinOutcome, AppError> {
        if request.rider_name.trim().is_empty() {
            return Err(AppError::missing("userName"));
        }
        if request.destination.name.trim().is_empty() {
            return Err(AppError::missing("destinationName"));
        }

        let (pool_id, created) = match request.pool_id {
            Some(pool_id) => {
                let pool = self.pools.get(pool_id).ok_or_else(|| pool_not_found(pool_id))?;
                if pool.status() != PoolStatus::Waiting {
                    return Err(AppError::InvalidState(format!(
                        "pool {pool_id} is no longer accepting riders"
                    )));
                }
                (pool_id, false)
            }
            None => match self.open_pool_for(&request) {
                Some(pool_id) => (pool_id, false),
                None => (self.create_pool(&request, now)?, true),
            },
        };

        let rider = NewRider {
            id: request.rider_id,
            name: request.rider_name,
            pickup: request.pickup,
        };

        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| pool_not_found(pool_id))?;
        let admitted = pool.add_rider(rider, &mut self.vehicles, now);

        let rider_id = match admitted {
            Ok(rider) => rider.id.clone(),
            Err(err) => {
                if created {
                    self.discard_pool(pool_id, now);
                }
                return Err(err);
            }
        };

        let snapshot = pool.snapshot();
        info!(
            pool_id = %pool_id,
            rider_id = %rider_id,
            spots_left = snapshot.spots_left,
            "rider joined pool"
        );

        let reservation = if snapshot.status == PoolStatus::Ready {
            pool_reservation(&snapshot, self.settings.reservation_ttl, now)
        } else {
            None
        };

        Ok(JoinOutcome {
            pool: snapshot,
            rider_id,
            created,
            reservation,
        })
    }

    fn open_pool_for(&self, request: &JoinRequest) -> Option<PoolId> {
        self.pools
            .iter()
            .find(|p| {
                p.is_open()
                    && p.destination().name == request.destination.name
                    && request.vehicle_id.is_none_or(|id| id == p.vehicle_id())
            })
            .map(Pool::id)
    }

    fn create_pool(&mut self, request: &JoinRequest, now: DateTime<Utc>) -> Result<PoolId, AppError> {
        let vehicle_id = request
            .vehicle_id
            .ok_or_else(|| AppError::missing("vehicleId"))?;
        let vehicle = self.vehicles.require(vehicle_id)?;

        if vehicle.is_full() {
            return Err(AppError::CapacityExceeded {
                subject: format!("vehicle {vehicle_id}"),
                count: usize::from(vehicle.passenger_count),
                capacity: usize::from(vehicle.max_capacity),
            });
        }
        if let Some(existing) = vehicle.pool_id() {
            return Err(AppError::InvalidState(format!(
                "vehicle {vehicle_id} is already attached to pool {existing}"
            )));
        }
        if vehicle.passenger_count > 0 || !vehicle.available {
            return Err(AppError::InvalidState(format!(
                "vehicle {vehicle_id} is carrying solo bookings"
            )));
        }

        let pool = Pool::create(request.destination.clone(), vehicle_id, &mut self.vehicles, now)?;
        let pool_id = pool.id();
        self.pools.insert(pool);
        Ok(pool_id)
    }

    fn discard_pool(&mut self, pool_id: PoolId, now: DateTime<Utc>) {
        if let Some(pool) = self.pools.remove(pool_id) {
            pool.release_vehicle(&mut self.vehicles, now);
        }
    }

    pub fn leave_pool(
        &mut self,
        pool_id: PoolId,
        rider_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LeaveOutcome, AppError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| pool_not_found(pool_id))?;

        let remaining = pool.remove_rider(rider_id, &mut self.vehicles, now)?;
        if remaining > 0 {
            return Ok(LeaveOutcome::Left {
                pool: pool.snapshot(),
            });
        }

        self.pools.remove(pool_id);
        info!(pool_id = %pool_id, "pool deleted (no riders left)");
        Ok(LeaveOutcome::Deleted { pool_id })
    }

    pub fn start_pool(&mut self, pool_id: PoolId, now: DateTime<Utc>) -> Result<PoolSnapshot, AppError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| pool_not_found(pool_id))?;

        pool.start(&mut self.vehicles, now)?;
        Ok(pool.snapshot())
    }

    /// Removes waiting pools older than the abandoned-pool TTL and hands
    /// their vehicles back. Ready and running pools are never touched.
    pub fn sweep_abandoned(&mut self, now: DateTime<Utc>) -> Vec<PoolId> {
        let ttl = self.settings.abandoned_pool_ttl;
        let abandoned = self
            .pools
            .drain_where(|p| p.status() == PoolStatus::Waiting && now - p.created_at() >= ttl);

        abandoned
            .into_iter()
            .map(|pool| {
                pool.release_vehicle(&mut self.vehicles, now);
                warn!(
                    pool_id = %pool.id(),
                    vehicle_id = pool.vehicle_id(),
                    riders = pool.riders().len(),
                    "abandoned pool swept"
                );
                pool.id()
            })
            .collect()
    }

    /// Ends whatever ride the vehicle is on. A pool attached to it is closed.
    pub fn complete_ride(&mut self, vehicle_id: VehicleId, now: DateTime<Utc>) -> Result<CompletedRide, AppError> {
        self.vehicles.require(vehicle_id)?;

        let closed_pool = self.pools.attached_to(vehicle_id).map(Pool::id);
        if let Some(pool_id) = closed_pool {
            self.pools.remove(pool_id);
        }

        let vehicle = self.vehicles.require_mut(vehicle_id)?;
        vehicle.release_pool_lock(now);
        vehicle.reserved_by = None;
        vehicle.trips_today = vehicle.trips_today.saturating_add(1);

        info!(vehicle_id, closed_pool = ?closed_pool.map(|id| id.to_string()), "ride completed");
        Ok(CompletedRide {
            vehicle_id,
            closed_pool,
        })
    }

    pub fn quote_ride(&self, request: &EtaRequest) -> Result<EtaQuote, AppError> {
        booking::quote(&self.vehicles, request)
    }

    pub fn reserve_vehicle(
        &mut self,
        vehicle_id: VehicleId,
        request: ReserveRequest,
        now: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        booking::reserve(
            &mut self.vehicles,
            vehicle_id,
            request,
            self.settings.reservation_ttl,
            now,
        )
    }

    pub fn release_vehicle(&mut self, vehicle_id: VehicleId, now: DateTime<Utc>) -> Result<ReleaseOutcome, AppError> {
        booking::release(&mut self.vehicles, vehicle_id, now)
    }
}

fn pool_not_found(pool_id: PoolId) -> AppError {
    AppError::NotFound(format!("pool {pool_id} not found"))
}
