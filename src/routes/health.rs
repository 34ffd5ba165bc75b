// src/routes/health.rs
//! Health check endpoint for the query service.
//!
//! `GET /health` always answers `200 OK` while the process is up. The
//! `warehouse` field reports whether a trivial query succeeds, so a probe can
//! tell "server up, warehouse down" apart from "server down".

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use crate::Config;

/// JSON response body for the `/health` endpoint.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub warehouse: &'static str,
}

async fn health(State((pool, _config)): State<(PgPool, Config)>) -> Json<HealthResponse> {
    // ---
    let warehouse = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!("Health check: warehouse unreachable: {}", e);
            "down"
        }
    };
    Json(HealthResponse {
        status: "ok",
        warehouse,
    })
}

pub fn router() -> Router<(PgPool, Config)> {
    Router::new().route("/health", get(health))
}
