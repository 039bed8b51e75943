//! Discord bot notifications.
//!
//! After a verified link the bot is told which Discord user now owns which
//! game account, so it can assign roles. Delivery is best effort: it runs on a
//! detached task and failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use gamelink_core::GameAccountId;

/// Header carrying the shared bot secret, in both directions.
pub const BOT_SECRET_HEADER: &str = "X-Bot-Secret";

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when notifying the bot.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bot answered with a non-200 status.
    #[error("bot returned status {0}")]
    Status(u16),
}

/// Payload sent to the bot after a verified link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkNotification {
    /// Discord user that verified.
    pub discord_id: String,
    /// Name of the created game account.
    pub username: String,
    /// Created game account.
    pub game_account_id: GameAccountId,
    /// Unix seconds at link time.
    pub timestamp: i64,
}

impl LinkNotification {
    /// Build a notification stamped with the current time.
    #[must_use]
    pub fn now(discord_id: String, username: String, game_account_id: GameAccountId) -> Self {
        Self {
            discord_id,
            username,
            game_account_id,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Sink for link notifications.
#[async_trait]
pub trait BotNotifier: Send + Sync {
    /// Deliver one notification.
    async fn notify_linked(&self, notification: &LinkNotification) -> Result<(), NotifyError>;
}

/// Notifier that POSTs to the bot's webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<Url>,
    secret: SecretString,
}

impl WebhookNotifier {
    /// Create a notifier. With no URL every notification is skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: Option<Url>, secret: SecretString) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            secret,
        })
    }
}

#[async_trait]
impl BotNotifier for WebhookNotifier {
    async fn notify_linked(&self, notification: &LinkNotification) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            tracing::warn!("bot webhook URL not configured, skipping notification");
            return Ok(());
        };

        let response = self
            .client
            .post(url.clone())
            .header(BOT_SECRET_HEADER, self.secret.expose_secret())
            .json(notification)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        tracing::info!(discord_id = %notification.discord_id, "bot notified");
        Ok(())
    }
}

/// Send a notification on a detached task. Failures are logged, never returned.
pub fn spawn_link_notification(
    notifier: Arc<dyn BotNotifier>,
    notification: LinkNotification,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify_linked(&notification).await {
            tracing::error!(
                error = %e,
                discord_id = %notification.discord_id,
                game_account_id = %notification.game_account_id,
                "bot notification failed"
            );
        }
    })
}
