//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database ping)
//!
//! # Public
//! GET  /shop/items                      - Active catalog items
//! GET  /profile/{user_id}               - Public profile
//!
//! # Player (bearer token)
//! PUT  /profile                         - Change avatar
//! GET  /game/credentials                - Game login credentials
//! GET  /game/characters                 - Characters on the linked account
//! POST /game/verify                     - Create and link a game account
//! POST /game/unstuck                    - Move a character to town
//! POST /game/purchase                   - Buy a catalog item
//! POST /game/redeem                     - Redeem a voucher code
//! POST /discord/verify?token=...        - Link through a Discord token
//!
//! # Bot (X-Bot-Secret)
//! POST /discord/verification-tokens     - Issue a Discord verification token
//!
//! # Admin (bearer token, admin role)
//! GET  /admin/users                     - List users
//! PUT  /admin/users/{user_id}/role      - Change a user's role
//! ```

pub mod admin;
pub mod discord;
pub mod game;
pub mod profile;
pub mod shop;

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::AllowedOrigins;
use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Create the game routes router.
pub fn game_routes() -> Router<AppState> {
    Router::new()
        .route("/credentials", get(game::credentials))
        .route("/characters", get(game::characters))
        .route("/verify", post(game::link_direct))
        .route("/unstuck", post(game::unstuck))
        .route("/purchase", post(game::purchase))
        .route("/redeem", post(game::redeem))
}

/// Create the Discord routes router.
pub fn discord_routes() -> Router<AppState> {
    Router::new()
        .route("/verification-tokens", post(discord::create_token))
        .route("/verify", post(discord::verify))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{user_id}/role", put(admin::update_role))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/shop/items", get(shop::items))
        .route("/profile", put(profile::update))
        .route("/profile/{user_id}", get(profile::show))
        .nest("/game", game_routes())
        .nest("/discord", discord_routes())
        .nest("/admin", admin_routes())
}

/// Build the complete application with all layers applied.
pub fn app(state: AppState, origins: &AllowedOrigins) -> Router {
    Router::new()
        .merge(routes())
        .layer(cors_layer(origins))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| {
                    HeaderValue::from_str(origin)
                        .inspect_err(|_| tracing::warn!(%origin, "ignoring invalid CORS origin"))
                        .ok()
                })
                .collect();
            layer.allow_origin(values)
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.users().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::REQUEST_ID_HEADER;
    use crate::testing::{FakeGateway, MemoryStore, RecordingNotifier, app_state};
    use std::sync::Arc;

    fn test_app(store: &Arc<MemoryStore>) -> Router {
        let state = app_state(
            store,
            Arc::new(FakeGateway::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();
        app(state, &AllowedOrigins::Any)
    }

    #[tokio::test]
    async fn test_health() {
        let store = Arc::new(MemoryStore::new());
        let response = test_app(&store)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_readiness_reflects_store() {
        let store = Arc::new(MemoryStore::new());
        let response = test_app(&store)
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        store.set_unavailable(true);
        let response = test_app(&store)
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_echoed() {
        let store = Arc::new(MemoryStore::new());
        let response = test_app(&store)
            .oneshot(
                Request::get("/health")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
    }
}
