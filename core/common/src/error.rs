// core/common/src/error.rs
// Closed error taxonomy for request handling

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::Level;

use crate::problem::ProblemDetail;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

impl InvalidParam {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    GeneralApplication,
    Validation,
    AuthTokenExpired,
    DataNotFound,
    Unclassified,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GeneralApplication => "general_application",
            ErrorKind::Validation => "validation",
            ErrorKind::AuthTokenExpired => "auth_token_expired",
            ErrorKind::DataNotFound => "data_not_found",
            ErrorKind::Unclassified => "unclassified",
        }
    }

    pub fn log_level(&self) -> Level {
        match self {
            ErrorKind::GeneralApplication => Level::INFO,
            ErrorKind::Validation => Level::INFO,
            ErrorKind::AuthTokenExpired => Level::WARN,
            ErrorKind::DataNotFound => Level::INFO,
            ErrorKind::Unclassified => Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure a handler can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    General {
        status: StatusCode,
        title: Option<String>,
        message: String,
    },
    #[error("validation errors were found in the request")]
    Validation(Vec<InvalidParam>),
    #[error("{0}")]
    TokenExpired(String),
    #[error("{0}")]
    DataNotFound(String),
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ApiError {
    pub fn general(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::General {
            status,
            title: None,
            message: message.into(),
        }
    }

    /// Overrides the problem title. Only general application errors carry one.
    pub fn with_title(self, title: impl Into<String>) -> Self {
        match self {
            ApiError::General { status, message, .. } => ApiError::General {
                status,
                title: Some(title.into()),
                message,
            },
            other => other,
        }
    }

    pub fn validation(params: Vec<InvalidParam>) -> Self {
        ApiError::Validation(params)
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        ApiError::TokenExpired(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::DataNotFound(message.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Unclassified(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::General { .. } => ErrorKind::GeneralApplication,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::TokenExpired(_) => ErrorKind::AuthTokenExpired,
            ApiError::DataNotFound(_) => ErrorKind::DataNotFound,
            ApiError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::General { status, .. } => *status,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::TokenExpired(_) => StatusCode::UNAUTHORIZED,
            ApiError::DataNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Used when a handler error reaches actix without the ProblemDetails
// middleware in front of it: no request path and no log record.
impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        ProblemDetail::from_error(self, "", Utc::now())
            .to_response()
            .unwrap_or_else(|_| HttpResponse::InternalServerError().finish())
    }
}

// Conversion from module error types
impl From<crate::auth::TokenError> for ApiError {
    fn from(err: crate::auth::TokenError) -> Self {
        use crate::auth::TokenError;

        match err {
            TokenError::NegativeLifetime(seconds) => ApiError::Validation(vec![InvalidParam::new(
                "lifetimeSeconds",
                format!("must not be negative, got {}", seconds),
            )]),
            TokenError::LifetimeOverflow(seconds) => ApiError::Validation(vec![InvalidParam::new(
                "lifetimeSeconds",
                format!("is too large to compute an expiry, got {}", seconds),
            )]),
            TokenError::ReservedClaim(name) => ApiError::Validation(vec![InvalidParam::new(
                name,
                "claim name is reserved for token timestamps",
            )]),
            err @ TokenError::Expired { .. } => ApiError::TokenExpired(err.to_string()),
            err @ TokenError::EmptyClaims => {
                ApiError::general(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            TokenError::Invalid(_) => {
                ApiError::general(StatusCode::UNAUTHORIZED, "The token could not be validated")
                    .with_title("Invalid Token")
            }
            err @ (TokenError::Signing(_)
            | TokenError::Key(_)
            | TokenError::KeyFile { .. }
            | TokenError::MissingRsaKey) => ApiError::Unclassified(err.into()),
        }
    }
}

impl From<crate::headers::HeaderError> for ApiError {
    fn from(err: crate::headers::HeaderError) -> Self {
        ApiError::general(StatusCode::UNAUTHORIZED, err.to_string()).with_title("Unauthorized")
    }
}

impl From<crate::mfa::MfaError> for ApiError {
    fn from(err: crate::mfa::MfaError) -> Self {
        use crate::mfa::MfaError;

        match err {
            MfaError::EmptyCode => {
                ApiError::Validation(vec![InvalidParam::new("code", err.to_string())])
            }
            err @ (MfaError::MissingSecret | MfaError::EmptySecret | MfaError::InvalidSecret) => {
                ApiError::Unclassified(err.into())
            }
        }
    }
}

impl From<crate::templates::TemplateError> for ApiError {
    fn from(err: crate::templates::TemplateError) -> Self {
        ApiError::Unclassified(err.into())
    }
}

impl From<crate::config::ConfigError> for ApiError {
    fn from(err: crate::config::ConfigError) -> Self {
        ApiError::Unclassified(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenError;
    use chrono::TimeZone;

    #[test]
    fn test_kind_status_and_level() {
        let cases = vec![
            (
                ApiError::general(StatusCode::CONFLICT, "duplicate"),
                ErrorKind::GeneralApplication,
                StatusCode::CONFLICT,
                Level::INFO,
            ),
            (
                ApiError::validation(vec![InvalidParam::new("email", "required")]),
                ErrorKind::Validation,
                StatusCode::BAD_REQUEST,
                Level::INFO,
            ),
            (
                ApiError::token_expired("expired"),
                ErrorKind::AuthTokenExpired,
                StatusCode::UNAUTHORIZED,
                Level::WARN,
            ),
            (
                ApiError::not_found("missing"),
                ErrorKind::DataNotFound,
                StatusCode::NOT_FOUND,
                Level::INFO,
            ),
            (
                ApiError::internal(anyhow::anyhow!("db down")),
                ErrorKind::Unclassified,
                StatusCode::INTERNAL_SERVER_ERROR,
                Level::ERROR,
            ),
        ];

        for (err, kind, status, level) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status(), status);
            assert_eq!(err.kind().log_level(), level);
        }
    }

    #[test]
    fn test_with_title_only_applies_to_general() {
        let err = ApiError::general(StatusCode::CONFLICT, "duplicate").with_title("Conflict");
        assert!(matches!(err, ApiError::General { title: Some(ref t), .. } if t == "Conflict"));

        let err = ApiError::not_found("missing").with_title("ignored");
        assert!(matches!(err, ApiError::DataNotFound(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::general(StatusCode::CONFLICT, "Test message");
        assert_eq!(format!("{}", err), "Test message");
    }

    #[test]
    fn test_response_error_status_code() {
        let err = ApiError::not_found("user 7 was not found");
        assert_eq!(ResponseError::status_code(&err), StatusCode::NOT_FOUND);
        assert_eq!(err.error_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_token_error_conversion() {
        let expired_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err: ApiError = TokenError::Expired { expired_at }.into();
        assert_eq!(err.kind(), ErrorKind::AuthTokenExpired);

        let err: ApiError = TokenError::EmptyClaims.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = TokenError::NegativeLifetime(-5).into();
        match err {
            ApiError::Validation(params) => {
                assert_eq!(params.len(), 1);
                assert_eq!(params[0].name, "lifetimeSeconds");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let err: ApiError = TokenError::LifetimeOverflow(i64::MAX).into();
        match err {
            ApiError::Validation(params) => {
                assert_eq!(params[0].name, "lifetimeSeconds");
                assert!(params[0].reason.contains("too large"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let err: ApiError = TokenError::MissingRsaKey.into();
        assert_eq!(err.kind(), ErrorKind::Unclassified);
    }
}
