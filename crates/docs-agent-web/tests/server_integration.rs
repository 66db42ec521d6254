//! Integration tests for the docs-agent-web server.
//!
//! These tests start a real axum server on a random port, backed by
//! in-memory SQLite, an in-memory vector store and a scripted model.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use docs_agent::prelude::*;
use docs_agent::store::{NewUser, UserRecord};
use docs_agent::testing::{HashEmbedder, ScriptedModel};
use docs_agent_web::auth::{AuthMethod, JwtKeys};
use docs_agent_web::oauth::{GoogleOAuth, GoogleOAuthConfig};
use docs_agent_web::{AppState, WebConfig, spawn_server};
use reqwest::StatusCode;
use serde_json::{Value, json};

const FRONTEND: &str = "http://frontend.test";

struct TestApp {
    base: String,
    store: Arc<SqliteStore>,
    jwt: Arc<JwtKeys>,
    http: reqwest::Client,
}

impl TestApp {
    async fn user(&self, email: &str, credits: i64, is_admin: bool) -> (UserRecord, String) {
        let user = self
            .store
            .create_user(NewUser {
                email: email.into(),
                hashed_password: String::new(),
                is_active: true,
                is_admin,
                credits,
            })
            .await
            .unwrap();
        let token = self.jwt.issue(&user, AuthMethod::Password).unwrap();
        (user, token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

/// Helper: spawn a test server on port 0 (random available port).
async fn spawn_test_server(model: ScriptedModel, oauth: Option<GoogleOAuthConfig>) -> TestApp {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let vectors = Arc::new(InMemoryVectorStore::new());
    let tools = ToolSet::new().with_retrieval_tools(vectors.clone(), Arc::new(HashEmbedder::new(64)));
    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        Arc::new(model),
        Arc::new(tools),
        HarnessConfig::default(),
    );
    let jwt = Arc::new(JwtKeys::new(b"integration-secret"));

    let state = AppState {
        store: store.clone(),
        vectors,
        orchestrator: Arc::new(orchestrator),
        jwt: jwt.clone(),
        oauth: oauth.map(|config| Arc::new(GoogleOAuth::new(config).unwrap())),
        frontend_url: FRONTEND.to_string(),
    };
    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
        ..Default::default()
    };
    let addr = spawn_server(state, config).await.unwrap();

    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    TestApp {
        base: format!("http://{addr}"),
        store,
        jwt,
        http,
    }
}

// ── Auth ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_activate_login_and_chat() {
    let model = ScriptedModel::new().then(ChatCompletion::text("Use `POST /auth/login`."));
    let app = spawn_test_server(model, None).await;
    let creds = json!({ "email": " new@example.com ", "password": "hunter22" });

    let resp = app
        .http
        .post(app.url("/auth/register"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["msg"], "User registered successfully. Pending activation.");

    // Pending activation.
    let resp = app
        .http
        .post(app.url("/auth/login"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Duplicate.
    let resp = app
        .http
        .post(app.url("/auth/register"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "The email is already registered.");

    let user = app
        .store
        .get_user_by_email("new@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.credits, 10);
    app.store.set_user_active(&user.id, true).await.unwrap();

    let resp = app
        .http
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "new@example.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .http
        .post(app.url("/auth/login"))
        .json(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    let me: Value = app
        .http
        .get(app.url("/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], "new@example.com");

    let conversation: Value = app
        .http
        .post(app.url("/conversations"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Demo" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversation["title"], "Demo");
    let id = conversation["id"].as_str().unwrap();

    let resp = app
        .http
        .post(app.url(&format!("/conversations/{id}/messages")))
        .bearer_auth(&token)
        .json(&json!({ "content": "How do I log in?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"]["role"], "assistant");
    assert_eq!(body["message"]["content"], "Use `POST /auth/login`.");
    assert_eq!(body["credits_remaining"], 9);
    assert_eq!(body["credits_deducted"], true);

    let history: Vec<Value> = app
        .http
        .get(app.url(&format!("/conversations/{id}/messages")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[1]["role"], "assistant");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;

    let resp = app.http.get(app.url("/conversations")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Not authenticated");

    let resp = app
        .http
        .get(app.url("/credits"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ── Conversations ────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_and_foreign_conversation_ids() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;
    let (owner, _) = app.user("owner@example.com", 5, false).await;
    let (_, token) = app.user("other@example.com", 5, false).await;
    let conversation = app
        .store
        .create_conversation(&owner.id, "Private")
        .await
        .unwrap();

    let resp = app
        .http
        .get(app.url("/conversations/42/messages"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid conversation ID format");

    let resp = app
        .http
        .get(app.url(&format!("/conversations/{}/messages", conversation.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .http
        .post(app.url(&format!("/conversations/{}/messages", conversation.id)))
        .bearer_auth(&token)
        .json(&json!({ "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_and_delete_conversations() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;
    let (user, token) = app.user("user@example.com", 5, false).await;
    let first = app.store.create_conversation(&user.id, "First").await.unwrap();
    app.store.create_conversation(&user.id, "Second").await.unwrap();

    let listed: Vec<Value> = app
        .http
        .get(app.url("/conversations?limit=1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let path = app.url(&format!("/conversations/{}", first.id));
    let resp = app.http.delete(&path).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], true);

    let resp = app.http.delete(&path).bearer_auth(&token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_balance_still_answers() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;
    let (user, token) = app.user("broke@example.com", 0, false).await;
    let conversation = app.store.create_conversation(&user.id, "Demo").await.unwrap();

    let body: Value = app
        .http
        .post(app.url(&format!("/conversations/{}/messages", conversation.id)))
        .bearer_auth(&token)
        .json(&json!({ "content": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"]["content"], "ok");
    assert_eq!(body["credits_remaining"], 0);
    assert_eq!(body["credits_deducted"], false);
}

// ── Credits ──────────────────────────────────────────────────────────

#[tokio::test]
async fn credit_endpoints() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;
    let (user, token) = app.user("user@example.com", 3, false).await;
    let (_, admin_token) = app.user("admin@example.com", 0, true).await;

    let body: Value = app
        .http
        .post(app.url("/credits/add"))
        .bearer_auth(&token)
        .json(&json!({ "credits": 4 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["credits"], 7);
    assert_eq!(body["message"], "Added 4 credits");

    let body: Value = app
        .http
        .get(app.url("/credits"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["credits"], 7);
    assert_eq!(body["email"], "user@example.com");

    let admin_path = app.url(&format!("/admin/users/{}/credits", user.id));
    let resp = app
        .http
        .post(&admin_path)
        .bearer_auth(&token)
        .json(&json!({ "credits": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Admin top-ups add to the balance.
    let body: Value = app
        .http
        .post(&admin_path)
        .bearer_auth(&admin_token)
        .json(&json!({ "credits": 100 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["credits"], 107);
    assert_eq!(body["message"], "Added 100 credits");
    assert_eq!(app.store.get_user(&user.id).await.unwrap().unwrap().credits, 107);

    let resp = app
        .http
        .post(app.url("/admin/users/not-a-uuid/credits"))
        .bearer_auth(&admin_token)
        .json(&json!({ "credits": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .http
        .post(app.url("/credits/add"))
        .bearer_auth(&token)
        .json(&json!({ "credits": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_components() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;

    let resp = app.http.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["database"], "healthy");
    assert_eq!(body["components"]["vector_store"], "healthy");
}

// ── Google OAuth ─────────────────────────────────────────────────────

#[tokio::test]
async fn oauth_not_configured() {
    let app = spawn_test_server(ScriptedModel::new(), None).await;

    let resp = app
        .http
        .get(app.url("/auth/oauth/google/url"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// A stand-in for Google's token and userinfo endpoints.
async fn spawn_fake_google() -> String {
    let router = Router::new()
        .route(
            "/token",
            post(|| async { axum::Json(json!({ "access_token": "google-token" })) }),
        )
        .route(
            "/userinfo",
            get(|| async {
                axum::Json(json!({ "email": "g@example.com", "email_verified": true }))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn oauth_callback_creates_user_and_redirects_with_token() {
    let google = spawn_fake_google().await;
    let config = GoogleOAuthConfig {
        auth_url: format!("{google}/auth"),
        token_url: format!("{google}/token"),
        userinfo_url: format!("{google}/userinfo"),
        ..GoogleOAuthConfig::new("id", "secret", "http://localhost/callback")
    };
    let app = spawn_test_server(ScriptedModel::new(), Some(config)).await;

    let body: Value = app
        .http
        .get(app.url("/auth/oauth/google/url"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let login_url = reqwest::Url::parse(body["login_url"].as_str().unwrap()).unwrap();
    let state = login_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let resp = app
        .http
        .get(app.url(&format!(
            "/auth/oauth/google/callback?code=abc&state={state}"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{FRONTEND}/oauth/callback?token=")));
    assert!(location.ends_with("auth_method=oauth"));

    let user = app
        .store
        .get_user_by_email("g@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.is_active);
    assert_eq!(user.credits, 10);

    // The state is single use.
    let resp = app
        .http
        .get(app.url(&format!(
            "/auth/oauth/google/callback?code=abc&state={state}"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers()["location"],
        format!("{FRONTEND}/login?error=oauth_failed")
    );
}
