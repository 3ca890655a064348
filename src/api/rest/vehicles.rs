use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::api::rest::{parse_vehicle_id, require, vehicle_id_from_json};
use crate::engine::booking::{EtaQuote, EtaRequest, ReserveRequest};
use crate::engine::coordinator::CompletedRide;
use crate::engine::directory::DEFAULT_NEARBY_RADIUS_KM;
use crate::error::AppError;
use crate::models::event::{PoolEvent, PoolEventKind};
use crate::models::reservation::Reservation;
use crate::models::vehicle::{GeoPoint, NearbyVehicle, Vehicle};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/available", get(available_vehicles))
        .route("/api/vehicles/nearby", get(nearby_vehicles))
        .route("/api/vehicles/:id", get(get_vehicle))
        .route("/api/vehicles/:id/reserve", post(reserve_vehicle))
        .route("/api/vehicles/:id/release", post(release_vehicle))
        .route("/api/vehicles/:id/complete-ride", post(complete_ride))
        .route("/api/rides/calculate-eta", post(calculate_eta))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveVehicleRequest {
    pub user_name: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dest_lat: Option<f64>,
    pub dest_lng: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateEtaRequest {
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dest_lat: Option<f64>,
    pub dest_lng: Option<f64>,
    pub vehicle_id: Option<Value>,
}

impl CalculateEtaRequest {
    fn into_eta_request(self) -> Result<EtaRequest, AppError> {
        let pickup_lat = require(self.pickup_lat, "pickupLat")?;
        let pickup_lng = require(self.pickup_lng, "pickupLng")?;
        let dest_lat = require(self.dest_lat, "destLat")?;
        let dest_lng = require(self.dest_lng, "destLng")?;
        let vehicle_id = require(vehicle_id_from_json(self.vehicle_id.as_ref())?, "vehicleId")?;

        Ok(EtaRequest {
            vehicle_id,
            pickup: GeoPoint::new(pickup_lat, pickup_lng),
            destination: GeoPoint::new(dest_lat, dest_lng),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveVehicleResponse {
    pub success: bool,
    pub message: String,
    pub reservation_id: Uuid,
    pub expiry_time: DateTime<Utc>,
    pub passenger_count: u8,
    pub available_seats: u8,
    pub reservation: Reservation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseVehicleResponse {
    pub success: bool,
    pub message: String,
    pub passenger_count: u8,
    pub available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRideResponse {
    pub success: bool,
    pub message: String,
    pub completed_reservations: usize,
    #[serde(flatten)]
    pub ride: CompletedRide,
}

async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    Json(state.coordinator.lock().await.vehicles().list())
}

async fn available_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<Vehicle>> {
    Json(state.coordinator.lock().await.vehicles().available())
}

async fn nearby_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyVehicle>>, AppError> {
    let (Some(lat), Some(lng)) = (query.lat, query.lng) else {
        return Err(AppError::BadRequest("lat and lng are required".to_string()));
    };
    let radius = query.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    if !radius.is_finite() || radius < 0.0 {
        return Err(AppError::BadRequest(format!("invalid radius {radius}")));
    }

    let origin = GeoPoint::new(lat, lng);
    Ok(Json(
        state
            .coordinator
            .lock()
            .await
            .vehicles()
            .nearby(&origin, radius),
    ))
}

async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle_id = parse_vehicle_id(&raw_id)?;
    let coordinator = state.coordinator.lock().await;
    coordinator.vehicles().require(vehicle_id).cloned().map(Json)
}

async fn reserve_vehicle(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(payload): Json<ReserveVehicleRequest>,
) -> Result<Json<ReserveVehicleResponse>, AppError> {
    let started = Instant::now();
    let result = reserve(&state, &raw_id, payload).await;
    state
        .metrics
        .observe("reserve", started.elapsed().as_secs_f64(), &result);
    result.map(Json)
}

async fn reserve(
    state: &AppState,
    raw_id: &str,
    payload: ReserveVehicleRequest,
) -> Result<ReserveVehicleResponse, AppError> {
    let vehicle_id = parse_vehicle_id(raw_id)?;
    let request = ReserveRequest {
        user_name: payload.user_name,
        pickup: GeoPoint::new(
            require(payload.pickup_lat, "pickupLat")?,
            require(payload.pickup_lng, "pickupLng")?,
        ),
        destination: GeoPoint::new(
            require(payload.dest_lat, "destLat")?,
            require(payload.dest_lng, "destLng")?,
        ),
    };
    let now = Utc::now();

    let (reservation, passenger_count, available_seats) = {
        let mut coordinator = state.coordinator.lock().await;
        let reservation = coordinator.reserve_vehicle(vehicle_id, request, now)?;
        state.reservations.insert(reservation.clone());
        let vehicle = coordinator.vehicles().require(vehicle_id)?;
        (reservation, vehicle.passenger_count, vehicle.available_seats())
    };

    Ok(ReserveVehicleResponse {
        success: true,
        message: format!("Seat reserved on {}", reservation.vehicle.name),
        reservation_id: reservation.id,
        expiry_time: reservation.expires_at,
        passenger_count,
        available_seats,
        reservation,
    })
}

async fn release_vehicle(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ReleaseVehicleResponse>, AppError> {
    let vehicle_id = parse_vehicle_id(&raw_id)?;
    let outcome = state
        .coordinator
        .lock()
        .await
        .release_vehicle(vehicle_id, Utc::now())?;

    Ok(Json(ReleaseVehicleResponse {
        success: true,
        message: "Seat released".to_string(),
        passenger_count: outcome.passenger_count,
        available: outcome.available,
    }))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<CompleteRideResponse>, AppError> {
    let started = Instant::now();
    let result = complete(&state, &raw_id).await;
    state
        .metrics
        .observe("complete_ride", started.elapsed().as_secs_f64(), &result);
    result.map(Json)
}

async fn complete(state: &AppState, raw_id: &str) -> Result<CompleteRideResponse, AppError> {
    let vehicle_id = parse_vehicle_id(raw_id)?;
    let now = Utc::now();

    // Only bookings made before the vehicle was freed belong to this ride.
    let (ride, completed_reservations) = {
        let mut coordinator = state.coordinator.lock().await;
        let ride = coordinator.complete_ride(vehicle_id, now)?;
        let completed = state.reservations.complete_for_vehicle(vehicle_id, now);
        state.record_pool_gauges(&coordinator);
        (ride, completed)
    };

    if let Some(pool_id) = ride.closed_pool {
        state.publish(PoolEvent::new(pool_id, PoolEventKind::Completed, None, now));
    }

    Ok(CompleteRideResponse {
        success: true,
        message: "Ride completed. Vehicle is available again.".to_string(),
        completed_reservations,
        ride,
    })
}

async fn calculate_eta(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CalculateEtaRequest>,
) -> Result<Json<EtaQuote>, AppError> {
    let request = payload.into_eta_request()?;
    let quote = state.coordinator.lock().await.quote_ride(&request)?;
    Ok(Json(quote))
}
