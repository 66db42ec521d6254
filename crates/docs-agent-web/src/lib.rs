//! HTTP API for `docs-agent`.
//!
//! `docs-agent-web` exposes the agent over REST: password and Google sign-in,
//! conversation CRUD, the message turn endpoint, credit bookkeeping and a
//! health probe. Every route except registration, login, OAuth and health
//! requires `Authorization: Bearer <jwt>`.
//!
//! # Quick start
//!
//! ```ignore
//! use docs_agent_web::{AppState, WebConfig, spawn_server};
//!
//! let state = AppState { store, vectors, orchestrator, jwt, oauth: None, frontend_url };
//! let addr = spawn_server(state, WebConfig::default()).await?;
//! println!("API: http://{addr}");
//! ```
//!
//! # Routes
//!
//! ```text
//! POST   /auth/register                 {email, password} → {msg}
//! POST   /auth/login                    {email, password} → {access_token, token_type}
//! GET    /me, /auth/me                  profile
//! GET    /auth/oauth/google/login       302 to Google
//! GET    /auth/oauth/google/callback    302 to the frontend with a token
//! GET    /auth/oauth/google/url         {login_url}
//! GET    /conversations                 newest-updated first
//! POST   /conversations                 {title}
//! DELETE /conversations/{id}            {message: true}
//! GET    /conversations/{id}/messages   creation order
//! POST   /conversations/{id}/messages   {content} → {message, credits_remaining}
//! GET    /credits                       {credits, email}
//! POST   /credits/add                   {credits} → {credits, message}
//! POST   /admin/users/{id}/credits      admin only; adds to the balance
//! GET    /health                        200 or 503
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod oauth;
mod server;

pub use api::AppState;
pub use error::ApiError;
pub use server::build_router;

use std::net::SocketAddr;

/// Default browser origins allowed by CORS.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5174",
];

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:8001`.
    pub bind_addr: SocketAddr,
    /// Origins allowed to call the API from a browser.
    pub cors_origins: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_server(state: AppState, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(state, &config.cors_origins);
    server::start_server(router, config.bind_addr).await
}
