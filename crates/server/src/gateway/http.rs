//! HTTP client for a game-store API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use url::Url;

use gamelink_core::{CharacterNo, GameAccountId, GoodsId};

use super::{Character, GameGateway, GatewayError};
use crate::config::HttpGatewayConfig;

#[derive(Serialize)]
struct CreateAccountRequest<'a> {
    username: &'a str,
    password_hash: &'a str,
}

#[derive(Deserialize)]
struct CreateAccountResponse {
    account_id: i32,
}

#[derive(Serialize)]
struct GrantGoodsRequest {
    goods_id: i32,
    quantity: i32,
}

/// Game gateway backed by the game store's HTTP API.
#[derive(Clone)]
pub struct HttpGameGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGameGateway {
    /// Create a new HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.token.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| GatewayError::Parse(format!("invalid gateway token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid gateway path {path}: {e}")))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GameGateway for HttpGameGateway {
    async fn create_account(
        &self,
        username: &str,
        credential_hash: &str,
    ) -> Result<GameAccountId, GatewayError> {
        let url = self.endpoint("accounts")?;
        let body = CreateAccountRequest {
            username,
            password_hash: credential_hash,
        };

        let response = self.client.post(url).json(&body).send().await?;
        let created: CreateAccountResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(GameAccountId::new(created.account_id))
    }

    async fn grant_goods(
        &self,
        account: GameAccountId,
        goods: GoodsId,
        quantity: i32,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("accounts/{account}/goods"))?;
        let body = GrantGoodsRequest {
            goods_id: goods.as_i32(),
            quantity,
        };

        let response = self.client.post(url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_characters(
        &self,
        account: GameAccountId,
    ) -> Result<Vec<Character>, GatewayError> {
        let url = self.endpoint(&format!("accounts/{account}/characters"))?;

        let response = self.client.get(url).send().await?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    async fn move_to_town(&self, character: CharacterNo) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("characters/{character}/unstuck"))?;

        let response = self.client.post(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn gateway(base: &str) -> HttpGameGateway {
        HttpGameGateway::new(&HttpGatewayConfig {
            base_url: Url::parse(base).unwrap(),
            token: SecretString::from("gateway-token-value"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let gw = gateway("https://game.example.com/api/");
        assert_eq!(
            gw.endpoint("accounts/7/goods").unwrap().as_str(),
            "https://game.example.com/api/accounts/7/goods"
        );
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let result = HttpGameGateway::new(&HttpGatewayConfig {
            base_url: Url::parse("https://game.example.com/").unwrap(),
            token: SecretString::from("bad\ntoken"),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(GatewayError::Parse(_))));
    }
}
