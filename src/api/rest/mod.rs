pub mod pools;
pub mod reservations;
pub mod vehicles;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::models::pool::PoolId;
use crate::models::vehicle::VehicleId;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(pools::router())
        .merge(vehicles::router())
        .merge(reservations::router())
        .route("/api/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Ids arrive as strings in paths; anything that is not a well-formed id
/// cannot name an existing record.
pub(crate) fn parse_pool_id(raw: &str) -> Result<PoolId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("pool {raw} not found")))
}

pub(crate) fn parse_vehicle_id(raw: &str) -> Result<VehicleId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("vehicle {raw} not found")))
}

/// Vehicle ids in JSON bodies must be integers. Strings and other shapes are
/// not coerced.
pub(crate) fn vehicle_id_from_json(value: Option<&Value>) -> Result<Option<VehicleId>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|id| VehicleId::try_from(id).ok())
            .map(Some)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {number} not found"))),
        Some(other) => Err(AppError::NotFound(format!("vehicle {other} not found"))),
    }
}

pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::missing(field))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VehicleCounts {
    total: usize,
    available: usize,
    full: usize,
    reserved_for_pool: usize,
}

#[derive(Serialize)]
struct ReservationCounts {
    total: usize,
    active: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolCounts {
    total: usize,
    waiting: usize,
    ready: usize,
    in_progress: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    vehicles: VehicleCounts,
    reservations: ReservationCounts,
    keke_pools: PoolCounts,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let coordinator = state.coordinator.lock().await;
    let vehicles = coordinator.vehicles();
    let counts = coordinator.pools().status_counts();

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        vehicles: VehicleCounts {
            total: vehicles.len(),
            available: vehicles.open_for_solo_count(),
            full: vehicles.full_count(),
            reserved_for_pool: vehicles.reserved_for_pool_count(),
        },
        reservations: ReservationCounts {
            total: state.reservations.len(),
            active: state.reservations.active_count(),
        },
        keke_pools: PoolCounts {
            total: coordinator.pools().len(),
            waiting: counts.waiting,
            ready: counts.ready,
            in_progress: counts.in_progress,
        },
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
