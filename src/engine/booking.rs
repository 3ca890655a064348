use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::directory::{round2, VehicleDirectory};
use crate::error::AppError;
use crate::geo::{eta_minutes, haversine_km, MIN_SOLO_PICKUP_MINUTES, MIN_SOLO_TRIP_MINUTES};
use crate::models::reservation::{Reservation, ReservationKind, ReservationStatus};
use crate::models::vehicle::{GeoPoint, Vehicle, VehicleId};

#[derive(Debug, Clone)]
pub struct EtaRequest {
    pub vehicle_id: VehicleId,
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedVehicle {
    pub id: VehicleId,
    pub name: String,
    pub driver: String,
    pub phone: String,
    pub color: String,
    pub passenger_count: u8,
    pub max_capacity: u8,
    pub available_seats: u8,
    pub rating: f64,
    pub reserved_for_pool: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaQuote {
    #[serde(rename = "pickupETA")]
    pub pickup_eta: u32,
    #[serde(rename = "tripETA")]
    pub trip_eta: u32,
    #[serde(rename = "totalETA")]
    pub total_eta: u32,
    pub pickup_distance: f64,
    pub trip_distance: f64,
    pub pickup_distance_text: String,
    pub trip_distance_text: String,
    pub pickup_duration_text: String,
    pub trip_duration_text: String,
    pub assigned_vehicle: QuotedVehicle,
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub user_name: Option<String>,
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub passenger_count: u8,
    pub available: bool,
}

fn ensure_solo_bookable(vehicle: &Vehicle) -> Result<(), AppError> {
    if let Some(pool_id) = vehicle.pool_id() {
        return Err(AppError::InvalidState(format!(
            "vehicle {} is reserved for pool {pool_id} and cannot be booked solo",
            vehicle.id
        )));
    }
    if vehicle.is_full() {
        return Err(AppError::CapacityExceeded {
            subject: format!("vehicle {}", vehicle.id),
            count: usize::from(vehicle.passenger_count),
            capacity: usize::from(vehicle.max_capacity),
        });
    }
    Ok(())
}

/// Single-rider pickup and trip estimate. Pickup and trip carry their own
/// minimum minutes, independent of the per-leg floor used for pools.
pub fn quote(vehicles: &VehicleDirectory, request: &EtaRequest) -> Result<EtaQuote, AppError> {
    let vehicle = vehicles.require(request.vehicle_id)?;
    ensure_solo_bookable(vehicle)?;

    let pickup_distance = haversine_km(&request.pickup, &vehicle.location);
    let trip_distance = haversine_km(&request.pickup, &request.destination);

    let pickup_eta = eta_minutes(pickup_distance, vehicle.speed, MIN_SOLO_PICKUP_MINUTES);
    let trip_eta = eta_minutes(trip_distance, vehicle.speed, MIN_SOLO_TRIP_MINUTES);

    Ok(EtaQuote {
        pickup_eta,
        trip_eta,
        total_eta: pickup_eta + trip_eta,
        pickup_distance: round2(pickup_distance),
        trip_distance: round2(trip_distance),
        pickup_distance_text: format!("{pickup_distance:.1} km"),
        trip_distance_text: format!("{trip_distance:.1} km"),
        pickup_duration_text: format!("{pickup_eta} min"),
        trip_duration_text: format!("{trip_eta} min"),
        assigned_vehicle: QuotedVehicle {
            id: vehicle.id,
            name: vehicle.name.clone(),
            driver: vehicle.driver.clone(),
            phone: vehicle.phone.clone(),
            color: vehicle.color.clone(),
            passenger_count: vehicle.passenger_count,
            max_capacity: vehicle.max_capacity,
            available_seats: vehicle.available_seats(),
            rating: vehicle.rating,
            reserved_for_pool: vehicle.reserved_for_pool(),
        },
    })
}

pub fn reserve(
    vehicles: &mut VehicleDirectory,
    vehicle_id: VehicleId,
    request: ReserveRequest,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Reservation, AppError> {
    let vehicle = vehicles.require_mut(vehicle_id)?;
    ensure_solo_bookable(vehicle)?;
    if !vehicle.available {
        return Err(AppError::InvalidState(format!(
            "vehicle {vehicle_id} is already reserved"
        )));
    }

    let user_name = request
        .user_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Guest".to_string());

    vehicle.passenger_count = vehicle.passenger_count.saturating_add(1);
    if vehicle.is_full() {
        vehicle.available = false;
    }
    vehicle.reserved_at = Some(now);
    vehicle.reserved_by = Some(user_name.clone());
    vehicle.last_update = now;

    let reservation = Reservation {
        id: Uuid::new_v4(),
        vehicle_id,
        vehicle: vehicle.summary(),
        status: ReservationStatus::Reserved,
        kind: ReservationKind::Solo {
            user_name,
            passenger_count: vehicle.passenger_count,
            pickup: request.pickup,
            destination: request.destination,
        },
        created_at: now,
        expires_at: now + ttl,
        completed_at: None,
    };

    info!(
        reservation_id = %reservation.id,
        vehicle_id,
        passenger_count = vehicle.passenger_count,
        "vehicle reserved"
    );

    Ok(reservation)
}

/// Gives back one solo seat.
pub fn release(
    vehicles: &mut VehicleDirectory,
    vehicle_id: VehicleId,
    now: DateTime<Utc>,
) -> Result<ReleaseOutcome, AppError> {
    let vehicle = vehicles.require_mut(vehicle_id)?;
    if vehicle.reserved_for_pool() {
        return Err(AppError::InvalidState(format!(
            "vehicle {vehicle_id} is attached to a pool; riders must leave the pool instead"
        )));
    }

    vehicle.passenger_count = vehicle.passenger_count.saturating_sub(1);
    if !vehicle.is_full() {
        vehicle.available = true;
        vehicle.reserved_by = None;
    }
    vehicle.last_update = now;

    info!(vehicle_id, passenger_count = vehicle.passenger_count, "vehicle released");

    Ok(ReleaseOutcome {
        passenger_count: vehicle.passenger_count,
        available: vehicle.available,
    })
}
