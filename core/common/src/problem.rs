// core/common/src/problem.rs
// Problem-detail payloads and the error translator

use actix_web::{http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn, Level};

use crate::clock::Clock;
use crate::error::{ApiError, InvalidParam};

pub const PROBLEM_JSON: &str = "application/problem+json";

const APPLICATION_ERROR_TITLE: &str = "Application Error";
const VALIDATION_ERROR_TITLE: &str = "Validation Error";
const TOKEN_ERROR_TITLE: &str = "Token Error";
const NOT_FOUND_TITLE: &str = "Not Found";
const INTERNAL_ERROR_TITLE: &str = "Internal Server Error";

const VALIDATION_DETAIL: &str = "Validation errors were found in the request.";
const INTERNAL_DETAIL: &str =
    "A technical inconsistency occurred. Please try again later.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    pub status: u16,
    pub title: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<InvalidParam>>,
}

impl ProblemDetail {
    /// Builds the client-facing payload. Never includes the text of
    /// unclassified errors.
    pub fn from_error(err: &ApiError, instance: &str, timestamp: DateTime<Utc>) -> Self {
        let status = err.status();

        let (title, detail, invalid_params) = match err {
            ApiError::General { title, message, .. } => (
                title.clone().unwrap_or_else(|| APPLICATION_ERROR_TITLE.to_string()),
                message.clone(),
                None,
            ),
            ApiError::Validation(params) => (
                VALIDATION_ERROR_TITLE.to_string(),
                VALIDATION_DETAIL.to_string(),
                Some(params.clone()),
            ),
            ApiError::TokenExpired(message) => {
                (TOKEN_ERROR_TITLE.to_string(), message.clone(), None)
            }
            ApiError::DataNotFound(message) => {
                (NOT_FOUND_TITLE.to_string(), message.clone(), None)
            }
            ApiError::Unclassified(_) => (
                INTERNAL_ERROR_TITLE.to_string(),
                INTERNAL_DETAIL.to_string(),
                None,
            ),
        };

        Self {
            status: status.as_u16(),
            title: non_empty_title(title, status),
            detail,
            timestamp,
            instance: instance.to_string(),
            invalid_params,
        }
    }

    pub fn to_response(&self) -> Result<HttpResponse, serde_json::Error> {
        let body = serde_json::to_string(self)?;
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        Ok(HttpResponse::build(status)
            .content_type(PROBLEM_JSON)
            .body(body))
    }
}

fn non_empty_title(title: String, status: StatusCode) -> String {
    if !title.trim().is_empty() {
        return title;
    }
    status
        .canonical_reason()
        .unwrap_or(APPLICATION_ERROR_TITLE)
        .to_string()
}

/// Turns failures into problem-detail responses plus one log record each.
#[derive(Clone)]
pub struct ErrorTranslator {
    clock: Arc<dyn Clock>,
}

impl ErrorTranslator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn translate(&self, err: &ApiError, instance: &str) -> ProblemDetail {
        let problem = ProblemDetail::from_error(err, instance, self.clock.now());
        log_error(err, &problem);
        problem
    }

    pub fn respond(&self, err: &ApiError, instance: &str) -> Result<HttpResponse, serde_json::Error> {
        self.translate(err, instance).to_response()
    }

    /// Errors that are not `ApiError` have no known kind and become unclassified.
    pub fn respond_to(
        &self,
        err: &actix_web::Error,
        instance: &str,
    ) -> Result<HttpResponse, serde_json::Error> {
        match err.as_error::<ApiError>() {
            Some(api_error) => self.respond(api_error, instance),
            None => {
                let unclassified = ApiError::Unclassified(anyhow::anyhow!("{}", err));
                self.respond(&unclassified, instance)
            }
        }
    }
}

fn log_error(err: &ApiError, problem: &ProblemDetail) {
    let kind = err.kind();

    match kind.log_level() {
        Level::ERROR => error!(
            kind = %kind,
            status = problem.status,
            instance = %problem.instance,
            error = %err,
            details = ?err,
            "Request failed"
        ),
        Level::WARN => warn!(
            kind = %kind,
            status = problem.status,
            instance = %problem.instance,
            error = %err,
            details = ?err,
            "Request failed"
        ),
        _ => info!(
            kind = %kind,
            status = problem.status,
            instance = %problem.instance,
            error = %err,
            details = ?err,
            "Request failed"
        ),
    }
}
