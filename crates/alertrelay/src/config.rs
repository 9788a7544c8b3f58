//! Configuration management for alertrelay.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::push::VapidKeys;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "alertrelay";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "alertrelay.db";

/// Longest accepted token lifetime (ten years).
const MAX_TOKEN_TTL_HOURS: u64 = 10 * 365 * 24;

/// Placeholder printed instead of secret values.
const REDACTED: &str = "<redacted>";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. The plain deployment variables `PORT`, `JWT_SECRET`,
///    `VAPID_PUBLIC_KEY` and `VAPID_PRIVATE_KEY`
/// 2. Environment variables prefixed with `ALERTRELAY_`, sections separated
///    by `__` (e.g. `ALERTRELAY_AUTH__JWT_SECRET`)
/// 3. TOML config file at `~/.config/alertrelay/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Web push configuration.
    pub push: PushConfig,
    /// Alert webhook configuration.
    pub webhook: WebhookConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory with the browser front-end, served as the router fallback.
    pub static_dir: Option<PathBuf>,
    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/alertrelay/alertrelay.db`
    pub database_path: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens.
    pub jwt_secret: String,
    /// Lifetime of issued tokens in hours.
    pub token_ttl_hours: u64,
    /// Minimum accepted password length at signup.
    pub min_password_length: usize,
}

/// Web push configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// VAPID application server public key (URL-safe base64).
    pub vapid_public_key: String,
    /// VAPID private key (URL-safe base64).
    pub vapid_private_key: String,
    /// Contact URI sent in the VAPID `sub` claim.
    pub subject: String,
    /// How long the push service should hold an undelivered message.
    pub ttl_seconds: u32,
    /// Notification title shown for every alert.
    pub alert_title: String,
    /// Notification icon path.
    pub alert_icon: String,
}

/// Alert webhook configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret expected in the `X-Webhook-Secret` header.
    /// When unset the webhook is open.
    pub secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: None,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            min_password_length: 6,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_public_key: String::new(),
            vapid_private_key: String::new(),
            subject: "mailto:example@domain.com".to_string(),
            ttl_seconds: 2_419_200, // 4 weeks
            alert_title: "Vehicle Alert".to_string(),
            alert_icon: "/icon.png".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the layered figment for the given config file.
    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file).nested())
            .merge(Env::prefixed("ALERTRELAY_").split("__"))
            .merge(
                Env::raw()
                    .only(&["PORT", "JWT_SECRET", "VAPID_PUBLIC_KEY", "VAPID_PRIVATE_KEY"])
                    .map(|key| {
                        let key = key.as_str();
                        if key.eq_ignore_ascii_case("PORT") {
                            "server.port".into()
                        } else if key.eq_ignore_ascii_case("JWT_SECRET") {
                            "auth.jwt_secret".into()
                        } else if key.eq_ignore_ascii_case("VAPID_PUBLIC_KEY") {
                            "push.vapid_public_key".into()
                        } else {
                            "push.vapid_private_key".into()
                        }
                    }),
            )
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// Secrets are not checked here, so tooling commands work on a fresh
    /// install; see [`Config::require_secrets`].
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("server.port must be greater than 0"));
        }

        if self.server.body_limit_bytes == 0 {
            return Err(Error::config(
                "server.body_limit_bytes must be greater than 0",
            ));
        }

        if self.auth.token_ttl_hours == 0 {
            return Err(Error::config("auth.token_ttl_hours must be greater than 0"));
        }

        if self.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(Error::config(format!(
                "auth.token_ttl_hours must be at most {MAX_TOKEN_TTL_HOURS}"
            )));
        }

        if self.auth.min_password_length == 0 {
            return Err(Error::config(
                "auth.min_password_length must be greater than 0",
            ));
        }

        let subject = &self.push.subject;
        if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
            return Err(Error::config(format!(
                "push.subject must be a mailto: or https: URI, got {subject}"
            )));
        }

        Ok(())
    }

    /// Check the secrets the server cannot run without.
    ///
    /// # Errors
    ///
    /// Returns an error if the token secret is empty, either VAPID key is
    /// missing, or the VAPID public key does not belong to the private key.
    pub fn require_secrets(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::config(
                "auth.jwt_secret is not set (JWT_SECRET or ALERTRELAY_AUTH__JWT_SECRET)",
            ));
        }

        if self.push.vapid_private_key.is_empty() || self.push.vapid_public_key.is_empty() {
            return Err(Error::config(
                "VAPID keys are not set; generate a pair with `alertrelay vapid-keys`",
            ));
        }

        let derived = VapidKeys::public_key_for(&self.push.vapid_private_key)?;
        if derived != self.push.vapid_public_key {
            return Err(Error::config(
                "push.vapid_public_key does not match push.vapid_private_key",
            ));
        }

        Ok(())
    }

    /// A copy of this configuration with every secret replaced.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.auth.jwt_secret.is_empty() {
            config.auth.jwt_secret = REDACTED.to_string();
        }
        if !config.push.vapid_private_key.is_empty() {
            config.push.vapid_private_key = REDACTED.to_string();
        }
        if config.webhook.secret.is_some() {
            config.webhook.secret = Some(REDACTED.to_string());
        }
        config
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the address the server binds.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|_| Error::config(format!("invalid server address: {addr}")))
    }

    /// Get the token lifetime as a Duration.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_hours.saturating_mul(60 * 60))
    }
}
