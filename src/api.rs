//! Minimal dev harness: health check, trigger a map generation, fetch
//! operation status. The full HTTP surface (auth, CRUD, PDF export,
//! municipality lookup) is an external collaborator and out of scope here
//! (SPEC_FULL §A).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::AsyncOperation;
use crate::road_service::{GenerateMapOptions, RoadService};

pub struct AppState {
    pub road_service: Arc<RoadService>,
    pub pool: sqlx::PgPool,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/maps", post(generate_map))
        .route("/operations/{id}", get(get_operation))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "UP" })
}

#[derive(Deserialize)]
struct GenerateMapRequest {
    origin: String,
    destination: String,
    road_id: Option<String>,
}

#[derive(Serialize)]
struct GenerateMapResponse {
    operation_id: Uuid,
}

/// Kicks off map generation in the background and immediately returns the
/// `operation_id` the caller polls via `GET /operations/{id}` (spec §6).
async fn generate_map(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateMapRequest>,
) -> Result<Json<GenerateMapResponse>, StatusCode> {
    let operation = state.road_service.start_operation(None).await.map_err(|e| {
        error!(error = %e, "failed to create async operation");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let operation_id = operation.id;

    let road_service = state.road_service.clone();
    tokio::spawn(async move {
        let options = GenerateMapOptions { road_id: req.road_id, ..GenerateMapOptions::default() };
        // run() finalizes the operation to completed/failed itself; only log here.
        if let Err(e) = road_service
            .run(operation_id, &req.origin, &req.destination, options, |percent| {
                info!(operation_id = %operation_id, percent, "map generation progress");
            })
            .await
        {
            error!(operation_id = %operation_id, error = %e, "map generation failed");
        }
    });

    Ok(Json(GenerateMapResponse { operation_id }))
}

async fn get_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AsyncOperation>, StatusCode> {
    crate::async_ops::get(&state.pool, id).await.map(Json).map_err(|_| StatusCode::NOT_FOUND)
}
