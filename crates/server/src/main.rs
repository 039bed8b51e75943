//! GameLink server.
//!
//! # Architecture
//!
//! - Axum HTTP API authenticated by bearer tokens from the central auth service
//! - `PostgreSQL` identity ledger (users, balances, links, purchases, vouchers)
//! - Game store reached through a gateway: its HTTP API or its `MySQL` databases
//! - Discord bot notified on a detached task after verified links

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;
use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamelink_server::config::{GatewayConfig, ServerConfig};
use gamelink_server::db;
use gamelink_server::gateway::{GameGateway, HttpGameGateway, SqlGameGateway};
use gamelink_server::routes;
use gamelink_server::services::{BotNotifier, TokenVerifier, WebhookNotifier};
use gamelink_server::state::{AppState, Stores};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

async fn connect_gateway(config: &GatewayConfig) -> Result<Arc<dyn GameGateway>, Box<dyn Error>> {
    Ok(match config {
        GatewayConfig::Http(http) => {
            tracing::info!(base_url = %http.base_url, "using HTTP game gateway");
            Arc::new(HttpGameGateway::new(http)?)
        }
        GatewayConfig::Sql(sql) => {
            let gateway = SqlGameGateway::connect(sql).await?;
            tracing::info!("using MySQL game gateway");
            Arc::new(gateway)
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gamelink_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p gamelink-cli -- migrate

    let gateway = connect_gateway(&config.gateway).await?;
    let notifier: Arc<dyn BotNotifier> = Arc::new(WebhookNotifier::new(
        config.bot_webhook_url.clone(),
        config.bot_secret.clone(),
    )?);
    let verifier = TokenVerifier::new(&config.jwt)?;

    let state = AppState::new(
        Stores::postgres(&pool),
        gateway,
        notifier,
        verifier,
        config.bot_secret.clone(),
    );

    let app = routes::app(state, &config.allowed_origins);

    let addr = config.socket_addr();
    tracing::info!("gamelink listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
