// core/common/src/auth.rs
// JWT lifecycle: create, sign, decode and expire bearer tokens

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::claims::{ClaimSet, NAME_CLAIM, ROLE_CLAIM};
use crate::clock::Clock;
use crate::config::TokenConfig;

const RESERVED_CLAIMS: [&str; 3] = ["iat", "nbf", "exp"];
const REFRESH_TOKEN_BYTES: usize = 64;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token lifetime must not be negative, got {0} seconds")]
    NegativeLifetime(i64),
    #[error("Token lifetime of {0} seconds overflows the expiry timestamp")]
    LifetimeOverflow(i64),
    #[error("Claim '{0}' is reserved")]
    ReservedClaim(String),
    #[error("Sorry, the token you are using is no longer valid")]
    Expired { expired_at: DateTime<Utc> },
    #[error("The token does not contain valid information")]
    EmptyClaims,
    #[error("Invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid key material: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RSA key paths are not configured")]
    MissingRsaKey,
}

/// Key material for signing and verifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningKey {
    /// HMAC-SHA256 shared secret.
    Secret(String),
    /// RSA-SHA256 key pair in PEM files. Read from disk on every use, so a
    /// rotated file takes effect on the next call.
    RsaPem {
        private_key_path: PathBuf,
        public_key_path: PathBuf,
    },
}

impl SigningKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            SigningKey::Secret(_) => Algorithm::HS256,
            SigningKey::RsaPem { .. } => Algorithm::RS256,
        }
    }

    fn encoding_key(&self) -> Result<EncodingKey, TokenError> {
        match self {
            SigningKey::Secret(secret) => Ok(EncodingKey::from_secret(secret.as_bytes())),
            SigningKey::RsaPem { private_key_path, .. } => {
                let pem = read_key_file(private_key_path)?;
                EncodingKey::from_rsa_pem(&pem).map_err(TokenError::Key)
            }
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, TokenError> {
        match self {
            SigningKey::Secret(secret) => Ok(DecodingKey::from_secret(secret.as_bytes())),
            SigningKey::RsaPem { public_key_path, .. } => {
                let pem = read_key_file(public_key_path)?;
                DecodingKey::from_rsa_pem(&pem).map_err(TokenError::Key)
            }
        }
    }
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, TokenError> {
    fs::read(path).map_err(|source| TokenError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    iat: i64,
    nbf: i64,
    exp: i64,
    #[serde(flatten)]
    claims: ClaimSet,
}

/// A verified, unexpired token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub claims: ClaimSet,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// OAuth-style token response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: i64, scope: impl Into<String>) -> Self {
        Self {
            access_token,
            token_type: default_token_type(),
            expires_in,
            refresh_token: None,
            scope: scope.into(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: String) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }
}

#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn symmetric_key(&self) -> SigningKey {
        SigningKey::Secret(self.config.secret.clone())
    }

    pub fn rsa_key(&self) -> Result<SigningKey, TokenError> {
        match (&self.config.rsa_private_key_path, &self.config.rsa_public_key_path) {
            (Some(private_key_path), Some(public_key_path)) => Ok(SigningKey::RsaPem {
                private_key_path: private_key_path.clone(),
                public_key_path: public_key_path.clone(),
            }),
            _ => Err(TokenError::MissingRsaKey),
        }
    }

    /// Signs `claims` into a token valid for `lifetime_seconds` from now.
    /// Claim content is not checked here; decoding rejects empty sets.
    pub fn create(
        &self,
        claims: &ClaimSet,
        lifetime_seconds: i64,
        key: &SigningKey,
    ) -> Result<String, TokenError> {
        if lifetime_seconds < 0 {
            return Err(TokenError::NegativeLifetime(lifetime_seconds));
        }
        if let Some(reserved) = claims.keys().find(|k| RESERVED_CLAIMS.contains(k)) {
            return Err(TokenError::ReservedClaim(reserved.to_string()));
        }

        let now = self.clock.now().timestamp();
        let exp = now
            .checked_add(lifetime_seconds)
            .ok_or(TokenError::LifetimeOverflow(lifetime_seconds))?;
        let payload = TokenPayload {
            iat: now,
            nbf: now,
            exp,
            claims: claims.clone(),
        };

        let token = encode(&Header::new(key.algorithm()), &payload, &key.encoding_key()?)
            .map_err(TokenError::Signing)?;

        info!(
            claims = ?claims,
            lifetime_seconds = lifetime_seconds,
            algorithm = ?key.algorithm(),
            "Token created"
        );

        Ok(token)
    }

    /// One `name` claim plus one `role` value per entry, default lifetime,
    /// symmetric key.
    pub fn create_standard_token<R: AsRef<str>>(
        &self,
        username: &str,
        roles: &[R],
    ) -> Result<String, TokenError> {
        let mut claims = ClaimSet::new().with(NAME_CLAIM, username);
        for role in roles {
            claims.push(ROLE_CLAIM, role.as_ref());
        }

        self.create(&claims, self.config.default_token_expiration, &self.symmetric_key())
    }

    pub fn create_rsa_token(
        &self,
        claims: &ClaimSet,
        lifetime_seconds: i64,
    ) -> Result<String, TokenError> {
        self.create(claims, lifetime_seconds, &self.rsa_key()?)
    }

    pub fn decode(&self, token: &str, key: &SigningKey) -> Result<ClaimSet, TokenError> {
        self.decode_token(token, key).map(|decoded| decoded.claims)
    }

    /// Verifies the signature, then checks expiry against the injected
    /// clock with no leeway, so an expired but authentic token is reported
    /// as `Expired` rather than `Invalid`.
    pub fn decode_token(&self, token: &str, key: &SigningKey) -> Result<DecodedToken, TokenError> {
        let mut validation = Validation::new(key.algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        let data = decode::<TokenPayload>(token, &key.decoding_key()?, &validation)
            .map_err(TokenError::Invalid)?;
        let payload = data.claims;

        let expires_at = timestamp(payload.exp);
        let now = self.clock.now();
        if now > expires_at {
            warn!(
                now = %now,
                expires_at = %expires_at,
                "Attempt to use an expired token"
            );
            return Err(TokenError::Expired { expired_at: expires_at });
        }

        if payload.claims.is_empty() {
            warn!("Attempt to use a token without claims");
            return Err(TokenError::EmptyClaims);
        }

        Ok(DecodedToken {
            claims: payload.claims,
            issued_at: timestamp(payload.iat),
            not_before: timestamp(payload.nbf),
            expires_at,
        })
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Opaque refresh token: 64 random bytes, standard base64.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::STANDARD.encode(bytes)
}

/// Seconds until `decoded` expires, never negative.
pub fn seconds_until_expiry(decoded: &DecodedToken, now: DateTime<Utc>) -> i64 {
    (decoded.expires_at - now).max(Duration::zero()).num_seconds()
}
