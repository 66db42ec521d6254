//! GET /health — connectivity of the database and the vector store.

use super::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use docs_agent::vector::VectorStore;
use serde::Serialize;
use tracing::{debug, error, info};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Components {
    pub database: String,
    pub vector_store: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub components: Components,
}

fn component<E: std::fmt::Display>(name: &str, result: Result<(), E>) -> String {
    match result {
        Ok(()) => {
            debug!("{name} health check passed");
            "healthy".to_string()
        }
        Err(e) => {
            error!(error = %e, "{name} health check failed");
            "unhealthy".to_string()
        }
    }
}

/// 200 when every component answers, 503 otherwise.
pub async fn health(State(app): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let (db, vectors) = tokio::join!(app.store.ping(), app.vectors.health_check());
    let components = Components {
        database: component("Database", db),
        vector_store: component("Vector store", vectors),
    };
    let healthy = components.database == "healthy" && components.vector_store == "healthy";
    let (status, code) = if healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };
    info!(status, "Health check completed");
    (code, Json(HealthReport { status, components }))
}
