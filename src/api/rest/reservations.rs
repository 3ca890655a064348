use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::reservation::ReservationView;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/reservations/:id", get(get_reservation))
}

async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ReservationView>, AppError> {
    let not_found = || AppError::NotFound(format!("reservation {raw_id} not found"));
    let id: Uuid = raw_id.parse().map_err(|_| not_found())?;

    state
        .reservations
        .view(&id, Utc::now())
        .map(Json)
        .ok_or_else(not_found)
}
