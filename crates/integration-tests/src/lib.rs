//! Integration tests for GameLink.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process API tests (no external services)
//! cargo test -p gamelink-integration-tests
//!
//! # PostgreSQL repository tests
//! GAMELINK_DATABASE_URL=postgres://... cargo test -p gamelink-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api` - HTTP routes over in-memory stores and a fake game gateway
//! - `postgres_stores` - Atomic repository operations against a real database

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use gamelink_server::config::AllowedOrigins;
use gamelink_server::models::User;
use gamelink_server::routes;
use gamelink_server::services::notify::BOT_SECRET_HEADER;
use gamelink_server::testing::{
    FakeGateway, MemoryStore, RecordingNotifier, TEST_BOT_SECRET, app_state, signed_token,
};

/// Boxed error for test helpers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The full application router over in-memory stores.
pub struct TestApp {
    /// Backing store for every repository.
    pub store: Arc<MemoryStore>,
    /// Game gateway double.
    pub gateway: Arc<FakeGateway>,
    /// Bot notifier double.
    pub notifier: Arc<RecordingNotifier>,
    router: Router,
}

/// Status and decoded body of a response.
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body, or a JSON string for plain-text bodies, or `null` when empty.
    pub body: Value,
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy)]
pub enum Caller<'a> {
    /// No credentials.
    Anonymous,
    /// Bearer token signed for this user.
    User(&'a User),
    /// The Discord bot's shared secret.
    Bot,
}

impl TestApp {
    /// Build the app with fresh doubles.
    ///
    /// # Errors
    ///
    /// Returns error if the token verifier cannot be built.
    pub fn new() -> Result<Self, BoxError> {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = app_state(&store, Arc::clone(&gateway), Arc::clone(&notifier))?;
        let router = routes::app(state, &AllowedOrigins::Any);

        Ok(Self {
            store,
            gateway,
            notifier,
            router,
        })
    }

    /// Store a user and return it.
    #[must_use]
    pub fn add_user(&self, user: User) -> User {
        self.store.insert_user(user)
    }

    /// Send a request with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built or the body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Caller<'_>,
        body: Option<Value>,
    ) -> Result<TestResponse, BoxError> {
        let mut builder = Request::builder().method(method).uri(uri);
        match caller {
            Caller::Anonymous => {}
            Caller::User(user) => {
                let token = signed_token(user)?;
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            Caller::Bot => builder = builder.header(BOT_SECRET_HEADER, TEST_BOT_SECRET),
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TestResponse { status, body })
    }

    /// `GET` as `caller`.
    ///
    /// # Errors
    ///
    /// See [`TestApp::send`].
    pub async fn get(&self, uri: &str, caller: Caller<'_>) -> Result<TestResponse, BoxError> {
        self.send(Method::GET, uri, caller, None).await
    }

    /// `POST` a JSON body as `caller`.
    ///
    /// # Errors
    ///
    /// See [`TestApp::send`].
    pub async fn post(
        &self,
        uri: &str,
        caller: Caller<'_>,
        body: Value,
    ) -> Result<TestResponse, BoxError> {
        self.send(Method::POST, uri, caller, Some(body)).await
    }

    /// `PUT` a JSON body as `caller`.
    ///
    /// # Errors
    ///
    /// See [`TestApp::send`].
    pub async fn put(
        &self,
        uri: &str,
        caller: Caller<'_>,
        body: Value,
    ) -> Result<TestResponse, BoxError> {
        self.send(Method::PUT, uri, caller, Some(body)).await
    }
}

impl TestResponse {
    /// The `error` code of an error body.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}
