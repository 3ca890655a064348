use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::rest::{parse_pool_id, require, vehicle_id_from_json};
use crate::engine::coordinator::{JoinRequest, LeaveOutcome};
use crate::error::AppError;
use crate::models::event::{PoolEvent, PoolEventKind};
use crate::models::pool::{Destination, PoolSnapshot, PoolStatus};
use crate::models::reservation::Reservation;
use crate::models::vehicle::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/kekepool/status", get(pool_status))
        .route("/api/kekepool/join", post(join_pool))
        .route("/api/kekepool/:pool_id", get(get_pool))
        .route("/api/kekepool/:pool_id/leave", post(leave_pool))
        .route("/api/kekepool/:pool_id/start", post(start_pool))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub destination: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPoolRequest {
    pub pool_id: Option<String>,
    pub rider_id: Option<String>,
    pub user_name: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub destination_name: Option<String>,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub vehicle_id: Option<Value>,
}

impl JoinPoolRequest {
    fn into_join_request(self) -> Result<JoinRequest, AppError> {
        let rider_name = require(self.user_name, "userName")?;
        let pickup_lat = require(self.pickup_lat, "pickupLat")?;
        let pickup_lng = require(self.pickup_lng, "pickupLng")?;
        let destination_name = require(self.destination_name, "destinationName")?;
        let destination_lat = require(self.destination_lat, "destinationLat")?;
        let destination_lng = require(self.destination_lng, "destinationLng")?;

        let pool_id = match self.pool_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_pool_id(raw)?),
        };

        Ok(JoinRequest {
            pool_id,
            rider_id: self.rider_id,
            rider_name,
            pickup: GeoPoint::new(pickup_lat, pickup_lng),
            destination: Destination {
                name: destination_name,
                location: GeoPoint::new(destination_lat, destination_lng),
            },
            vehicle_id: vehicle_id_from_json(self.vehicle_id.as_ref())?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePoolRequest {
    pub rider_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatusResponse {
    pub server_time: DateTime<Utc>,
    pub exists: bool,
    pub group: Option<PoolSnapshot>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPoolResponse {
    pub server_time: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub rider_id: String,
    pub pool: PoolSnapshot,
    pub reservation: Option<Reservation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolResponse {
    pub server_time: DateTime<Utc>,
    #[serde(flatten)]
    pub pool: PoolSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePoolResponse {
    pub server_time: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: LeaveOutcome,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPoolResponse {
    pub server_time: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub pool: PoolSnapshot,
}

async fn pool_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PoolStatusResponse>, AppError> {
    let destination = query
        .destination
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::missing("destination"))?;

    let group = state.coordinator.lock().await.find_open_pool(&destination);

    Ok(Json(PoolStatusResponse {
        server_time: Utc::now(),
        exists: group.is_some(),
        group,
    }))
}

async fn join_pool(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<JoinPoolRequest>,
) -> Result<Json<JoinPoolResponse>, AppError> {
    let started = Instant::now();
    let result = join(&state, payload).await;
    state
        .metrics
        .observe("join", started.elapsed().as_secs_f64(), &result);
    result.map(Json)
}

async fn join(state: &AppState, payload: JoinPoolRequest) -> Result<JoinPoolResponse, AppError> {
    let request = payload.into_join_request()?;
    let now = Utc::now();

    // The group reservation must exist before the coordinator lock drops.
    let outcome = {
        let mut coordinator = state.coordinator.lock().await;
        let outcome = coordinator.join_pool(request, now)?;
        if let Some(reservation) = &outcome.reservation {
            state.reservations.insert(reservation.clone());
        }
        state.record_pool_gauges(&coordinator);
        outcome
    };

    let pool_id = outcome.pool.id;
    if outcome.created {
        state.publish(PoolEvent::new(pool_id, PoolEventKind::Created, None, now));
    }
    state.publish(PoolEvent::new(
        pool_id,
        PoolEventKind::RiderJoined,
        Some(outcome.pool.clone()),
        now,
    ));

    let message = if outcome.pool.status == PoolStatus::Ready {
        state.publish(PoolEvent::new(
            pool_id,
            PoolEventKind::Ready,
            Some(outcome.pool.clone()),
            now,
        ));
        "Pool is ready! Ride will start.".to_string()
    } else {
        format!(
            "Joined pool. Waiting for {} more rider(s).",
            outcome.pool.spots_left
        )
    };

    Ok(JoinPoolResponse {
        server_time: now,
        success: true,
        message,
        rider_id: outcome.rider_id,
        pool: outcome.pool,
        reservation: outcome.reservation,
    })
}

async fn get_pool(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<PoolResponse>, AppError> {
    let pool_id = parse_pool_id(&raw_id)?;
    let pool = state.coordinator.lock().await.get_pool(pool_id)?;

    Ok(Json(PoolResponse {
        server_time: Utc::now(),
        pool,
    }))
}

async fn leave_pool(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(payload): Json<LeavePoolRequest>,
) -> Result<Json<LeavePoolResponse>, AppError> {
    let started = Instant::now();
    let result = leave(&state, &raw_id, payload).await;
    state
        .metrics
        .observe("leave", started.elapsed().as_secs_f64(), &result);
    result.map(Json)
}

async fn leave(
    state: &AppState,
    raw_id: &str,
    payload: LeavePoolRequest,
) -> Result<LeavePoolResponse, AppError> {
    let pool_id = parse_pool_id(raw_id)?;
    let rider_id = require(payload.rider_id, "riderId")?;
    let now = Utc::now();

    let outcome = {
        let mut coordinator = state.coordinator.lock().await;
        let outcome = coordinator.leave_pool(pool_id, &rider_id, now)?;
        state.record_pool_gauges(&coordinator);
        outcome
    };

    let message = match &outcome {
        LeaveOutcome::Left { pool } => {
            state.publish(PoolEvent::new(
                pool_id,
                PoolEventKind::RiderLeft,
                Some(pool.clone()),
                now,
            ));
            "Left pool".to_string()
        }
        LeaveOutcome::Deleted { .. } => {
            state.publish(PoolEvent::new(pool_id, PoolEventKind::Deleted, None, now));
            "Pool deleted (no riders left)".to_string()
        }
    };

    Ok(LeavePoolResponse {
        server_time: now,
        success: true,
        message,
        outcome,
    })
}

async fn start_pool(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<StartPoolResponse>, AppError> {
    let started = Instant::now();
    let result = start(&state, &raw_id).await;
    state
        .metrics
        .observe("start", started.elapsed().as_secs_f64(), &result);
    result.map(Json)
}

async fn start(state: &AppState, raw_id: &str) -> Result<StartPoolResponse, AppError> {
    let pool_id = parse_pool_id(raw_id)?;
    let now = Utc::now();

    let pool = {
        let mut coordinator = state.coordinator.lock().await;
        let pool = coordinator.start_pool(pool_id, now)?;
        state.reservations.mark_pool_started(pool_id);
        state.record_pool_gauges(&coordinator);
        pool
    };

    state.publish(PoolEvent::new(
        pool_id,
        PoolEventKind::Started,
        Some(pool.clone()),
        now,
    ));

    Ok(StartPoolResponse {
        server_time: now,
        success: true,
        message: "Pool ride started".to_string(),
        pool,
    })
}
