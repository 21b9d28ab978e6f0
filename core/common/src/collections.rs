// core/common/src/collections.rs
// Not-found conversions and in-memory pagination

use serde::Serialize;

use crate::error::{ApiError, InvalidParam};

pub const EMPTY_LIST_MESSAGE: &str = "The list is empty.";

pub trait OptionExt<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}

pub trait VecExt<T>: Sized {
    fn non_empty_or_not_found(self, message: impl Into<String>) -> Result<Self, ApiError>;
}

impl<T> VecExt<T> for Vec<T> {
    fn non_empty_or_not_found(self, message: impl Into<String>) -> Result<Self, ApiError> {
        if self.is_empty() {
            return Err(ApiError::not_found(message));
        }
        Ok(self)
    }
}

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page_number: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Result<Self, ApiError> {
        let mut invalid = Vec::new();
        if page_number < 1 {
            invalid.push(InvalidParam::new(
                "pageNumber",
                format!("must be greater than or equal to 1, got {}", page_number),
            ));
        }
        if page_size < 1 {
            invalid.push(InvalidParam::new(
                "pageSize",
                format!("must be greater than or equal to 1, got {}", page_size),
            ));
        }
        if !invalid.is_empty() {
            return Err(ApiError::validation(invalid));
        }

        Ok(Self {
            page_number: page_number as u64,
            page_size: page_size as u64,
        })
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn offset(&self) -> usize {
        ((self.page_number - 1).saturating_mul(self.page_size)) as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    pub fn apply<I: IntoIterator>(&self, items: I) -> impl Iterator<Item = I::Item> {
        items.into_iter().skip(self.offset()).take(self.limit())
    }
}
