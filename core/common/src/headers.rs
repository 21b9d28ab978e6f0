// core/common/src/headers.rs
// Authorization header parsing and client address lookup

use actix_web::HttpRequest;
use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

pub const BEARER_PREFIX: &str = "Bearer ";
const BASIC_PREFIX: &str = "Basic ";
const REAL_IP_HEADER: &str = "X-Real-IP";

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Invalid authorization header format")]
    InvalidFormat,
    #[error("Invalid credentials format")]
    InvalidCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<String, HeaderError> {
    match auth_header.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(HeaderError::InvalidFormat),
    }
}

/// Decode `Basic base64(username:password)`.
pub fn decode_basic_authorization(auth_header: &str) -> Result<Credentials, HeaderError> {
    let has_prefix = auth_header
        .get(..BASIC_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BASIC_PREFIX));
    if auth_header.trim().is_empty() || !has_prefix {
        return Err(HeaderError::InvalidFormat);
    }

    let encoded = auth_header[BASIC_PREFIX.len()..].trim();
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| HeaderError::InvalidFormat)?;
    let decoded = String::from_utf8(bytes).map_err(|_| HeaderError::InvalidFormat)?;

    let parts: Vec<&str> = decoded.split(':').collect();
    match parts.as_slice() {
        [username, password] => Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(HeaderError::InvalidCredentials),
    }
}

/// `X-Real-IP` when a proxy set it, otherwise the peer address.
pub fn client_ip(req: &HttpRequest) -> String {
    req.headers()
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.trim().to_string())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unavailable".to_string())
}
