//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GAMELINK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `GAMELINK_JWT_PUBLIC_KEY` - RS256 public key (PEM) of the central auth service, or
//! - `GAMELINK_JWT_SECRET` - HS256 shared secret (min 32 chars, high entropy)
//! - `GAMELINK_BOT_SECRET` - Shared secret with the Discord bot (min 32 chars, high entropy)
//! - `GAME_GATEWAY` - `http` or `mysql`
//!   - `http`: `GAME_GATEWAY_URL`, `GAME_GATEWAY_TOKEN`
//!   - `mysql`: `GAME_ACCOUNT_DB_URL`, `GAME_CHARACTER_DB_URL`
//!
//! ## Optional
//! - `GAMELINK_HOST` - Bind address (default: 127.0.0.1)
//! - `GAMELINK_PORT` - Listen port (default: 8080)
//! - `GAMELINK_ALLOWED_ORIGINS` - Comma-separated CORS origins (default: `*`)
//! - `GAMELINK_BOT_WEBHOOK_URL` - Bot endpoint notified after verified links
//! - `GAME_GATEWAY_TIMEOUT_SECS` - Game store request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SHARED_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// CORS origins
    pub allowed_origins: AllowedOrigins,
    /// How caller tokens are verified
    pub jwt: JwtConfig,
    /// Secret the Discord bot presents and receives
    pub bot_secret: SecretString,
    /// Bot endpoint notified after a verified link
    pub bot_webhook_url: Option<Url>,
    /// Game store access
    pub gateway: GatewayConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Origins allowed by CORS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin.
    Any,
    /// Only these origins.
    List(Vec<String>),
}

/// Verification key for caller tokens.
///
/// Implements `Debug` manually to redact the shared secret.
#[derive(Clone)]
pub enum JwtConfig {
    /// RS256 tokens signed by the central auth service.
    Rs256 {
        /// PEM-encoded public key.
        public_key_pem: String,
    },
    /// HS256 tokens with a shared secret.
    Hs256 {
        /// Shared secret.
        secret: SecretString,
    },
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rs256 { public_key_pem } => f
                .debug_struct("Rs256")
                .field("public_key_pem", public_key_pem)
                .finish(),
            Self::Hs256 { .. } => f
                .debug_struct("Hs256")
                .field("secret", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Which game gateway to use.
#[derive(Debug, Clone)]
pub enum GatewayConfig {
    /// Game store HTTP API.
    Http(HttpGatewayConfig),
    /// Game store databases.
    Sql(SqlGatewayConfig),
}

/// Game store HTTP API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct HttpGatewayConfig {
    /// API base URL (always ends with `/`)
    pub base_url: Url,
    /// Bearer token
    pub token: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Game store database configuration.
#[derive(Debug, Clone)]
pub struct SqlGatewayConfig {
    /// Account database URL (contains password)
    pub account_db_url: SecretString,
    /// Character database URL (contains password)
    pub character_db_url: SecretString,
    /// Connection acquire timeout
    pub timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GAMELINK_DATABASE_URL")?;
        let host = get_env_or_default("GAMELINK_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GAMELINK_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GAMELINK_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GAMELINK_PORT".to_string(), e.to_string()))?;
        let allowed_origins = parse_origins(&get_env_or_default("GAMELINK_ALLOWED_ORIGINS", "*"));

        let jwt = JwtConfig::from_env()?;
        let bot_secret = get_validated_secret("GAMELINK_BOT_SECRET")?;
        validate_secret_length(&bot_secret, "GAMELINK_BOT_SECRET")?;
        let bot_webhook_url = get_optional_env("GAMELINK_BOT_WEBHOOK_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("GAMELINK_BOT_WEBHOOK_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let gateway = GatewayConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            allowed_origins,
            jwt,
            bot_secret,
            bot_webhook_url,
            gateway,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        if let Some(public_key_pem) = get_optional_env("GAMELINK_JWT_PUBLIC_KEY") {
            // Single-line env values carry escaped newlines.
            return Ok(Self::Rs256 {
                public_key_pem: public_key_pem.replace("\\n", "\n"),
            });
        }

        let secret = get_validated_secret("GAMELINK_JWT_SECRET").map_err(|e| match e {
            ConfigError::MissingEnvVar(_) => ConfigError::MissingEnvVar(
                "GAMELINK_JWT_PUBLIC_KEY or GAMELINK_JWT_SECRET".to_string(),
            ),
            other => other,
        })?;
        validate_secret_length(&secret, "GAMELINK_JWT_SECRET")?;
        Ok(Self::Hs256 { secret })
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout = get_env_or_default(
            "GAME_GATEWAY_TIMEOUT_SECS",
            &DEFAULT_GATEWAY_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("GAME_GATEWAY_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        match get_required_env("GAME_GATEWAY")?.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http(HttpGatewayConfig {
                base_url: parse_base_url(&get_required_env("GAME_GATEWAY_URL")?)
                    .map_err(|e| ConfigError::InvalidEnvVar("GAME_GATEWAY_URL".to_string(), e))?,
                token: get_validated_secret("GAME_GATEWAY_TOKEN")?,
                timeout,
            })),
            "mysql" => Ok(Self::Sql(SqlGatewayConfig {
                account_db_url: get_required_secret("GAME_ACCOUNT_DB_URL")?,
                character_db_url: get_required_secret("GAME_CHARACTER_DB_URL")?,
                timeout,
            })),
            other => Err(ConfigError::InvalidEnvVar(
                "GAME_GATEWAY".to_string(),
                format!("expected 'http' or 'mysql', got '{other}'"),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a comma-separated origin list; `*` or an empty list allows any origin.
fn parse_origins(raw: &str) -> AllowedOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_owned)
        .collect();

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowedOrigins::Any
    } else {
        AllowedOrigins::List(origins)
    }
}

/// Parse a base URL so that relative joins stay under its path.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Validate that a shared secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SHARED_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SHARED_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-bot-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), AllowedOrigins::Any);
        assert_eq!(parse_origins(""), AllowedOrigins::Any);
        assert_eq!(
            parse_origins("https://a.example, https://b.example"),
            AllowedOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://game.example.com/api").unwrap();
        assert_eq!(url.as_str(), "https://game.example.com/api/");
        assert_eq!(
            url.join("accounts").unwrap().as_str(),
            "https://game.example.com/api/accounts"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let config = JwtConfig::Hs256 {
            secret: SecretString::from("super_secret_signing_key"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_signing_key"));
    }

    #[test]
    fn test_http_gateway_debug_redacts_token() {
        let config = HttpGatewayConfig {
            base_url: Url::parse("https://game.example.com/").unwrap(),
            token: SecretString::from("gateway_token_value"),
            timeout: Duration::from_secs(15),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("game.example.com"));
        assert!(!debug_output.contains("gateway_token_value"));
    }
}
