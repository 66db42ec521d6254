//! Documentation agent API server.
//!
//! # Usage
//!
//! ```bash
//! JWT_SECRET=... LLM_API_KEY=sk-... cargo run -p docs-agent-web
//! JWT_SECRET=... LLM_API_KEY=sk-... cargo run -p docs-agent-web -- --port 8080 --log-format json
//! ```
//!
//! Azure OpenAI:
//!
//! ```bash
//! LLM_URL="https://acme.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-02-01" \
//! LLM_AUTH_STYLE=api-key LLM_MODEL= cargo run -p docs-agent-web
//! ```

use std::sync::Arc;

use clap::Parser;
use docs_agent::prelude::*;
use docs_agent::redact::mask_secret;
use docs_agent::tools::PdfToChunks;
use docs_agent_web::auth::JwtKeys;
use docs_agent_web::config::{Args, LogFormat};
use docs_agent_web::oauth::GoogleOAuth;
use docs_agent_web::{AppState, spawn_server};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    init_tracing(args.log_format);
    info!("Application starting up");

    // 1. Model and embedding clients.
    let chat_config = args.chat_config()?;
    info!(
        url = %chat_config.url,
        api_key = %mask_secret(&chat_config.api_key),
        "Chat endpoint configured"
    );
    let model = ChatClient::new(chat_config).map_err(|e| e.to_string())?;
    let embedder =
        OpenAiEmbeddings::new(args.embeddings_config()?).map_err(|e| e.to_string())?;

    // 2. Stores.
    let store = SqliteStore::connect(&args.database_url, args.store_options())
        .await
        .map_err(|e| format!("Failed to establish database connection: {e}"))?;
    let vectors: Arc<dyn VectorStore> = Arc::new(
        QdrantStore::new(&args.qdrant_url, args.qdrant_api_key.clone())
            .map_err(|e| e.to_string())?,
    );

    // 3. Tools and the turn pipeline.
    let mut tools = ToolSet::new().with_retrieval_tools(vectors.clone(), Arc::new(embedder));
    if let Some(root) = &args.pdf_root {
        tools.register(PdfToChunks::with_root(root));
    }
    let store = Arc::new(store);
    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        Arc::new(model),
        Arc::new(tools),
        args.harness_config(),
    );

    // 4. Auth.
    let oauth = match args.google_oauth() {
        Some(config) => Some(Arc::new(GoogleOAuth::new(config).map_err(|e| e.to_string())?)),
        None => {
            info!("Google sign-in disabled (GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET unset)");
            None
        }
    };

    let state = AppState {
        store,
        vectors,
        orchestrator: Arc::new(orchestrator),
        jwt: Arc::new(JwtKeys::new(args.jwt_secret.as_bytes())),
        oauth,
        frontend_url: args.frontend_url.clone(),
    };

    let addr = spawn_server(state, args.web_config())
        .await
        .map_err(|e| format!("Failed to bind: {e}"))?;
    info!("Listening on http://{addr}");

    tokio::signal::ctrl_c().await.map_err(|e| e.to_string())?;
    info!("Application shutting down");
    Ok(())
}
