//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named in its help text. Secrets are never echoed in logs.

use crate::oauth::GoogleOAuthConfig;
use crate::{DEFAULT_CORS_ORIGINS, WebConfig};
use clap::{Parser, ValueEnum};
use docs_agent::agent::config::{DEFAULT_MAX_ROUNDS, HarnessConfig};
use docs_agent::store::StoreOptions;
use docs_agent::vector::EmbeddingsConfig;
use docs_agent::vector::embeddings::{
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, OPENAI_EMBEDDINGS_URL,
};
use docs_agent::{AuthStyle, ChatClientConfig, DEFAULT_MODEL, OPENAI_CHAT_URL};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Documentation agent HTTP API.
#[derive(Debug, Parser)]
#[command(about = "HTTP API for the documentation agent")]
pub struct Args {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// SQLite database URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://docs_agent.db")]
    pub database_url: String,

    /// Maximum pooled database connections.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub database_max_connections: u32,

    /// Secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Chat completions URL (OpenAI-compatible).
    #[arg(long, env = "LLM_URL", default_value = OPENAI_CHAT_URL)]
    pub llm_url: String,

    /// API key for the chat endpoint.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// How the key is sent: `bearer` or `api-key` (Azure).
    #[arg(long, env = "LLM_AUTH_STYLE", default_value = "bearer")]
    pub llm_auth_style: AuthStyle,

    /// Model name; pass an empty string for deployments that fix the model.
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub llm_model: String,

    /// Model rounds allowed per turn.
    #[arg(long, env = "MAX_ROUNDS", default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: u32,

    /// Embeddings URL (OpenAI-compatible).
    #[arg(long, env = "EMBEDDINGS_URL", default_value = OPENAI_EMBEDDINGS_URL)]
    pub embeddings_url: String,

    /// API key for the embeddings endpoint. Defaults to the chat key.
    #[arg(long, env = "EMBEDDINGS_API_KEY", hide_env_values = true)]
    pub embeddings_api_key: Option<String>,

    /// Embedding model; empty for deployments that fix the model.
    #[arg(long, env = "EMBEDDINGS_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embeddings_model: String,

    /// Vector size produced by the embedding model.
    #[arg(long, env = "EMBEDDINGS_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embeddings_dimensions: usize,

    /// Confine `pdf_to_chunks` to files under this directory.
    #[arg(long, env = "PDF_ROOT")]
    pub pdf_root: Option<PathBuf>,

    /// Qdrant gRPC URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Callback URL registered with Google.
    #[arg(
        long,
        env = "GOOGLE_REDIRECT_URI",
        default_value = "http://localhost:8001/auth/oauth/google/callback"
    )]
    pub google_redirect_uri: String,

    /// Browser app base URL; OAuth sign-in redirects here.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Comma-separated origins allowed by CORS.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl Args {
    fn llm_key(&self) -> Result<&str, String> {
        self.llm_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| "LLM_API_KEY (or --llm-api-key) is required".to_string())
    }

    pub fn chat_config(&self) -> Result<ChatClientConfig, String> {
        Ok(ChatClientConfig {
            url: self.llm_url.clone(),
            api_key: self.llm_key()?.to_string(),
            auth_style: self.llm_auth_style,
        })
    }

    pub fn embeddings_config(&self) -> Result<EmbeddingsConfig, String> {
        let api_key = match self.embeddings_api_key.as_deref().and_then(non_empty) {
            Some(key) => key,
            None => self.llm_key()?.to_string(),
        };
        Ok(EmbeddingsConfig {
            url: self.embeddings_url.clone(),
            api_key,
            auth_style: self.llm_auth_style,
            model: non_empty(&self.embeddings_model),
            dimensions: self.embeddings_dimensions,
        })
    }

    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig::default()
            .with_model(non_empty(&self.llm_model))
            .with_max_rounds(self.max_rounds)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.database_max_connections.max(1),
            ..StoreOptions::default()
        }
    }

    /// Google sign-in, when both client id and secret are set.
    pub fn google_oauth(&self) -> Option<GoogleOAuthConfig> {
        let id = self.google_client_id.as_deref().and_then(non_empty)?;
        let secret = self.google_client_secret.as_deref().and_then(non_empty)?;
        Some(GoogleOAuthConfig::new(id, secret, &self.google_redirect_uri))
    }

    pub fn web_config(&self) -> WebConfig {
        let cors_origins = if self.cors_origins.is_empty() {
            DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect()
        } else {
            self.cors_origins.clone()
        };
        WebConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            cors_origins,
        }
    }
}
