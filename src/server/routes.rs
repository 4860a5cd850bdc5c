use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::server::response::ApiResponse;
use crate::server::server::AppState;
use crate::stations::StationCommandDispatcher;

pub static SERVICE_NAME: &str = "station-agent";

#[derive(Clone)]
pub struct StationState {
    pub dispatcher: StationCommandDispatcher,
}

impl StationState {
    pub fn new(dispatcher: StationCommandDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn router(&self) -> Router<AppState> {
        Router::new()
            .route("/health", get(health))
            .route("/token", get(token))
            .route("/stations/{station_id}/slots", get(slots))
            .route("/pop/{station_id}/all", post(pop_all))
            .route("/pop/{station_id}/{slot}", post(pop_slot))
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    refresh_in_flight: bool,
    timestamp: String,
}

#[derive(Serialize)]
struct TokenBody {
    token: String,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        service: SERVICE_NAME,
        refresh_in_flight: state.station_state.dispatcher.caller().refresher().in_flight(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn token(State(state): State<AppState>) -> Response {
    match state.station_state.dispatcher.caller().current_token().await {
        Some(token) => Json(ApiResponse::ok(TokenBody {
            token: token.as_str().to_string(),
        }))
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("token not available")),
        )
            .into_response(),
    }
}

async fn slots(State(state): State<AppState>, Path(station_id): Path<String>) -> Response {
    match state.station_state.dispatcher.get_slots(&station_id).await {
        Ok(counts) => Json(ApiResponse::ok(counts)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn pop_all(State(state): State<AppState>, Path(station_id): Path<String>) -> Response {
    info!("pop all requested for station {}", station_id);
    match state.station_state.dispatcher.pop_all(&station_id).await {
        Ok(released) => Json(ApiResponse::list(released)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn pop_slot(State(state): State<AppState>, Path((station_id, slot)): Path<(String, String)>) -> Response {
    let Ok(slot) = slot.trim().parse::<i64>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("invalid slot number {}", slot))),
        )
            .into_response();
    };

    info!("pop requested for station {} slot {}", station_id, slot);
    match state.station_state.dispatcher.pop_slot(&station_id, slot).await {
        Ok(released) => Json(ApiResponse::list(vec![released])).into_response(),
        Err(e) => e.into_response(),
    }
}
