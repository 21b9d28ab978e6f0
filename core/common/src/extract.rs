// core/common/src/extract.rs
// Extractor configs that report malformed input as validation errors

use actix_web::web::{JsonConfig, PathConfig, QueryConfig};

use crate::error::{ApiError, InvalidParam};

fn invalid(part: &str, reason: String) -> actix_web::Error {
    ApiError::validation(vec![InvalidParam::new(part, reason)]).into()
}

pub fn json_config() -> JsonConfig {
    JsonConfig::default().error_handler(|err, _req| invalid("body", err.to_string()))
}

pub fn query_config() -> QueryConfig {
    QueryConfig::default().error_handler(|err, _req| invalid("query", err.to_string()))
}

pub fn path_config() -> PathConfig {
    PathConfig::default().error_handler(|err, _req| invalid("path", err.to_string()))
}
