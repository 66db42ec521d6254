//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::api::{self, AppState};

/// CORS for the configured browser origins. Unparseable entries are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    info!(origins = ?origins, "CORS configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full axum router.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login))
        .route("/me", get(api::auth::me))
        .route("/oauth/google/login", get(api::oauth::login))
        .route("/oauth/google/callback", get(api::oauth::callback))
        .route("/oauth/google/url", get(api::oauth::login_url));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/me", get(api::auth::me))
        .route(
            "/conversations",
            get(api::conversations::list).post(api::conversations::create),
        )
        .route("/conversations/{id}", delete(api::conversations::delete))
        .route(
            "/conversations/{id}/messages",
            get(api::conversations::messages).post(api::conversations::send),
        )
        .route("/credits", get(api::credits::balance))
        .route("/credits/add", post(api::credits::add))
        .route("/admin/users/{id}/credits", post(api::credits::admin_add))
        .route("/health", get(api::health::health))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Bind, spawn the server on a Tokio task, and return the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    Ok(addr)
}
