// core/common/src/config.rs
// Process-wide configuration, read once at startup

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Invalid {
                var: "APP_ENV".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    /// Seconds.
    pub default_token_expiration: i64,
    #[serde(default)]
    pub rsa_private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub rsa_public_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub auth_token_cookie_name: String,
    pub refresh_token_cookie_name: String,
    pub lifetime_days: i64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            auth_token_cookie_name: "X-Auth-Token".to_string(),
            refresh_token_cookie_name: "X-Refresh-Token".to_string(),
            lifetime_days: 30,
            http_only: true,
            secure: true,
            same_site: "Strict".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MfaConfig {
    /// Base32.
    pub secret_key: String,
    pub totp_size: u32,
    /// Seconds per code.
    pub step: u64,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            totp_size: 6,
            step: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationsConfig {
    pub sender_company: String,
    pub sender_system: String,
    pub mail_sender: String,
    pub recovery_page_url: String,
    pub confirmation_page_url: String,
    /// Seconds.
    pub recovery_token_expiration: i64,
}

#[derive(Debug, Clone)]
pub struct CommonsConfig {
    pub environment: Environment,
    pub token: TokenConfig,
    pub cookies: CookieConfig,
    pub mfa: MfaConfig,
    pub notifications: Option<NotificationsConfig>,
}

impl CommonsConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let environment = match var("APP_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let token = TokenConfig {
            secret: required("JWT_SECRET")?,
            default_token_expiration: parse_or("JWT_DEFAULT_EXPIRATION_SECONDS", 3600)?,
            rsa_private_key_path: var("JWT_RSA_PRIVATE_KEY_PATH").map(PathBuf::from),
            rsa_public_key_path: var("JWT_RSA_PUBLIC_KEY_PATH").map(PathBuf::from),
        };

        let defaults = CookieConfig::default();
        let cookies = CookieConfig {
            auth_token_cookie_name: var("COOKIE_AUTH_TOKEN_NAME")
                .unwrap_or(defaults.auth_token_cookie_name),
            refresh_token_cookie_name: var("COOKIE_REFRESH_TOKEN_NAME")
                .unwrap_or(defaults.refresh_token_cookie_name),
            lifetime_days: parse_or("COOKIE_LIFETIME_DAYS", defaults.lifetime_days)?,
            http_only: parse_or("COOKIE_HTTP_ONLY", defaults.http_only)?,
            secure: parse_or("COOKIE_SECURE", defaults.secure)?,
            same_site: var("COOKIE_SAME_SITE").unwrap_or(defaults.same_site),
        };

        let mfa_defaults = MfaConfig::default();
        let mfa = MfaConfig {
            secret_key: var("MFA_SECRET_KEY").unwrap_or_default(),
            totp_size: parse_or("MFA_TOTP_SIZE", mfa_defaults.totp_size)?,
            step: parse_or("MFA_STEP_SECONDS", mfa_defaults.step)?,
        };

        // Mail is optional; configured only when a sender is present.
        let notifications = match var("MAIL_SENDER") {
            Some(mail_sender) => Some(NotificationsConfig {
                sender_company: required("MAIL_SENDER_COMPANY")?,
                sender_system: required("MAIL_SENDER_SYSTEM")?,
                mail_sender,
                recovery_page_url: required("MAIL_RECOVERY_PAGE_URL")?,
                confirmation_page_url: required("MAIL_CONFIRMATION_PAGE_URL")?,
                recovery_token_expiration: parse_or("MAIL_RECOVERY_TOKEN_EXPIRATION_SECONDS", 86400)?,
            }),
            None => None,
        };

        tracing::info!(
            environment = ?environment,
            rsa_configured = token.rsa_private_key_path.is_some(),
            mail_configured = notifications.is_some(),
            "Configuration loaded"
        );

        Ok(Self {
            environment,
            token,
            cookies,
            mfa,
            notifications,
        })
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &str) -> Result<String, ConfigError> {
    var(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
