// core/common/src/templates.rs
// Embedded resources and `{Key}` placeholder rendering

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub const FIRST_PASSWORD_TEMPLATE: &str = "first_password.html";
pub const PASSWORD_UPDATED_TEMPLATE: &str = "password_updated.html";
pub const EMAIL_CONFIRMATION_TEMPLATE: &str = "email_confirmation.html";

/// Resources compiled into the crate, keyed by their relative path.
pub static EMBEDDED_RESOURCES: &[(&str, &str)] = &[
    (
        "templates/first_password.html",
        include_str!("../templates/first_password.html"),
    ),
    (
        "templates/password_updated.html",
        include_str!("../templates/password_updated.html"),
    ),
    (
        "templates/email_confirmation.html",
        include_str!("../templates/email_confirmation.html"),
    ),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Resource '{0}' was not found")]
    NotFound(String),
}

/// Lookup cache over a resource table. Shared by handle; the first value
/// cached for a name is the one every later caller sees.
#[derive(Debug)]
pub struct ResourceCache {
    resources: &'static [(&'static str, &'static str)],
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl ResourceCache {
    pub fn new(resources: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            resources,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EMBEDDED_RESOURCES)
    }

    /// First resource whose name ends with `partial_name`.
    pub fn get_resource(&self, partial_name: &str) -> Result<Arc<str>, TemplateError> {
        {
            let cache = self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(content) = cache.get(partial_name) {
                return Ok(content.clone());
            }
        }

        let (name, content) = self
            .resources
            .iter()
            .find(|(name, _)| name.ends_with(partial_name))
            .ok_or_else(|| TemplateError::NotFound(partial_name.to_string()))?;

        tracing::debug!(resource = %name, "Loaded embedded resource");

        let mut cache = self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let cached = cache
            .entry(partial_name.to_string())
            .or_insert_with(|| Arc::from(*content));
        Ok(cached.clone())
    }

    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Replaces every `{Key}` with its value in a single pass, so substituted
/// values are never scanned again. Unknown placeholders stay as they are.
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    let mut body = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        body.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            body.push_str(&rest[open..]);
            return body;
        };

        let key = &after[..close];
        match params.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => {
                body.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                body.push('{');
                rest = after;
            }
        }
    }

    body.push_str(rest);
    body
}
