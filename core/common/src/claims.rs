// core/common/src/claims.rs
// Ordered claim bag carried by tokens, and the request user built from it

use actix_web::{dev::Payload, http::StatusCode, FromRequest, HttpMessage, HttpRequest};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::future::{ready, Ready};

use crate::error::ApiError;

pub const NAME_CLAIM: &str = "name";
pub const ROLE_CLAIM: &str = "role";

pub const ANONYMOUS_USER: &str = "anonymous";

/// Claims keyed by name. Keys keep insertion order, and so do the values
/// under each key (duplicates included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    entries: Vec<(String, Vec<String>)>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    fn extend_key(&mut self, key: String, values: Vec<String>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((key, values)),
        }
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.first(NAME_CLAIM)
    }

    pub fn roles(&self) -> &[String] {
        self.values(ROLE_CLAIM)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    /// True when no key carries a value.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, values)| values.is_empty())
    }
}

// One value serializes as a plain string, several as an array.
impl Serialize for ClaimSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            match values.as_slice() {
                [single] => map.serialize_entry(key, single)?,
                many => map.serialize_entry(key, many)?,
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClaimValues {
    One(String),
    Many(Vec<String>),
}

struct ClaimSetVisitor;

impl<'de> Visitor<'de> for ClaimSetVisitor {
    type Value = ClaimSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of claim names to a string or a list of strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut claims = ClaimSet::new();
        while let Some((key, values)) = access.next_entry::<String, ClaimValues>()? {
            let values = match values {
                ClaimValues::One(value) => vec![value],
                ClaimValues::Many(values) => values,
            };
            claims.extend_key(key, values);
        }
        Ok(claims)
    }
}

impl<'de> Deserialize<'de> for ClaimSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ClaimSetVisitor)
    }
}

/// The principal behind the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestUser {
    pub username: String,
    pub roles: Vec<String>,
}

impl RequestUser {
    /// Without claims the caller is anonymous; an authenticated user must
    /// carry at least one role.
    pub fn from_claims(claims: Option<&ClaimSet>) -> Result<Self, ApiError> {
        let username = claims
            .and_then(ClaimSet::name)
            .unwrap_or(ANONYMOUS_USER)
            .to_string();
        let roles = claims.map(|c| c.roles().to_vec()).unwrap_or_default();

        if username != ANONYMOUS_USER && roles.is_empty() {
            return Err(ApiError::general(
                StatusCode::NOT_FOUND,
                format!("No roles were found for user {}", username),
            ));
        }

        tracing::info!(username = %username, "Resolved request user");

        Ok(Self { username, roles })
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS_USER
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl FromRequest for RequestUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        ready(RequestUser::from_claims(extensions.get::<ClaimSet>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_push_preserves_order_and_duplicates() {
        let claims = ClaimSet::new()
            .with(NAME_CLAIM, "alice")
            .with(ROLE_CLAIM, "admin")
            .with(ROLE_CLAIM, "ops")
            .with(ROLE_CLAIM, "admin");

        assert_eq!(claims.name(), Some("alice"));
        assert_eq!(claims.roles(), &["admin", "ops", "admin"]);
        assert_eq!(claims.keys().collect::<Vec<_>>(), vec![NAME_CLAIM, ROLE_CLAIM]);
    }

    #[test]
    fn test_serialize_single_and_multi_values() {
        let claims = ClaimSet::new()
            .with(NAME_CLAIM, "alice")
            .with(ROLE_CLAIM, "admin")
            .with(ROLE_CLAIM, "ops");

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json, serde_json::json!({"name": "alice", "role": ["admin", "ops"]}));
    }

    #[test]
    fn test_deserialize_keeps_document_order() {
        let claims: ClaimSet =
            serde_json::from_str(r#"{"tenant":"t-1","name":"bob","role":["b","a"]}"#).unwrap();

        assert_eq!(claims.keys().collect::<Vec<_>>(), vec!["tenant", "name", "role"]);
        assert_eq!(claims.roles(), &["b", "a"]);
    }

    #[test]
    fn test_rejects_non_string_values() {
        let result: Result<ClaimSet, _> = serde_json::from_str(r#"{"level": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_is_empty() {
        assert!(ClaimSet::new().is_empty());
        assert!(!ClaimSet::new().with("sub", "x").is_empty());

        let only_empty: ClaimSet = serde_json::from_str(r#"{"role": []}"#).unwrap();
        assert!(only_empty.is_empty());
    }

    #[test]
    fn test_request_user_anonymous() {
        let user = RequestUser::from_claims(None).unwrap();
        assert!(user.is_anonymous());
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_request_user_with_roles() {
        let claims = ClaimSet::new().with(NAME_CLAIM, "alice").with(ROLE_CLAIM, "admin");
        let user = RequestUser::from_claims(Some(&claims)).unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.has_role("admin"));
        assert!(!user.has_role("ops"));
    }

    #[test]
    fn test_request_user_without_roles_is_rejected() {
        let claims = ClaimSet::new().with(NAME_CLAIM, "alice");
        let err = RequestUser::from_claims(Some(&claims)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GeneralApplication);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
