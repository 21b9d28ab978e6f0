// core/common/src/validation.rs
// Request input validation

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::error::{ApiError, InvalidParam};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("is required")]
    Required,
    #[error("exceeds maximum length of {0} characters")]
    ExceedsMaxLength(usize),
    #[error("contains potentially dangerous content")]
    XssAttempt,
    #[error("email address {0} does not have a valid format")]
    InvalidEmail(String),
    #[error("must be at least 6 characters and combine two of: lowercase letters, uppercase letters, digits")]
    WeakPassword,
    #[error("start date must be on or before end date")]
    InvertedDateRange,
    #[error("date range must not exceed {0} months")]
    DateRangeTooLong(u32),
    #[error("file '{file_name}' does not have a valid extension. Allowed extensions: {allowed}")]
    InvalidFileExtension { file_name: String, allowed: String },
    #[error("file size exceeds the maximum of {0} bytes")]
    FileTooLarge(u64),
}

const EMAIL_PATTERN: &str =
    r"(?i)^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(\.[a-zA-Z]{2,})+$";
const MIN_PASSWORD_LENGTH: usize = 6;

// ============================================================================
// FIELD VALIDATORS
// ============================================================================

pub fn validate_required(input: Option<&str>) -> Result<(), ValidationError> {
    match input {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::Required),
    }
}

/// Length validation, in characters
pub fn validate_max_length(input: &str, max_length: usize) -> Result<(), ValidationError> {
    if input.chars().count() > max_length {
        return Err(ValidationError::ExceedsMaxLength(max_length));
    }
    Ok(())
}

/// XSS prevention
pub fn validate_no_xss(input: &str) -> Result<(), ValidationError> {
    let dangerous_patterns = [
        "<script", "javascript:", "onerror=", "onclick=",
        "onload=", "<iframe", "document.cookie", "eval(",
    ];

    let input_lower = input.to_lowercase();
    for pattern in &dangerous_patterns {
        if input_lower.contains(pattern) {
            return Err(ValidationError::XssAttempt);
        }
    }
    Ok(())
}

/// Absent values pass; combine with `validate_required` for mandatory fields.
fn email_regex() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

pub fn validate_email(email: Option<&str>) -> Result<(), ValidationError> {
    let Some(email) = email else {
        return Ok(());
    };

    let matches = email_regex().is_some_and(|re| re.is_match(email));
    if !matches {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let classes = [has_lower, has_upper, has_digit]
        .iter()
        .filter(|present| **present)
        .count();

    if password.chars().count() < MIN_PASSWORD_LENGTH || classes < 2 {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

/// Calendar months between the two dates; days are ignored. Open ranges pass.
pub fn validate_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    max_months: u32,
) -> Result<(), ValidationError> {
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(());
    };

    if start > end {
        return Err(ValidationError::InvertedDateRange);
    }

    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if months > max_months as i32 {
        return Err(ValidationError::DateRangeTooLong(max_months));
    }
    Ok(())
}

/// `allowed` entries include the dot, e.g. `".pdf"`.
pub fn validate_file_extension(file_name: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        return Err(ValidationError::InvalidFileExtension {
            file_name: file_name.to_string(),
            allowed: allowed.join(", "),
        });
    }
    Ok(())
}

pub fn validate_file_size(size_bytes: u64, max_bytes: u64) -> Result<(), ValidationError> {
    if size_bytes > max_bytes {
        return Err(ValidationError::FileTooLarge(max_bytes));
    }
    Ok(())
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Gathers failures across fields, one invalid param each, in call order.
#[derive(Debug, Default)]
pub struct Validator {
    invalid_params: Vec<InvalidParam>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, field: &str, result: Result<(), ValidationError>) -> &mut Self {
        if let Err(err) = result {
            self.invalid_params.push(InvalidParam::new(field, err.to_string()));
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_params.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.invalid_params.is_empty() {
            return Ok(());
        }
        Err(ApiError::Validation(self.invalid_params))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(vec![InvalidParam::new("request", err.to_string())])
    }
}

// ============================================================================
// TESTS
// ============================================================================
