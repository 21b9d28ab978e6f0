// core/common/src/cookies.rs
// Token cookies for browser clients

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde_json::json;

use crate::auth::TokenResponse;
use crate::config::{CookieConfig, Environment};

pub const AUTHENTICATED_MESSAGE: &str = "Authentication successful.";

#[derive(Debug, Clone)]
pub struct AuthCookies {
    config: CookieConfig,
}

impl AuthCookies {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn auth_cookie_name(&self) -> &str {
        &self.config.auth_token_cookie_name
    }

    pub fn refresh_cookie_name(&self) -> &str {
        &self.config.refresh_token_cookie_name
    }

    pub fn token_cookie(&self, name: &str, token: &str) -> Cookie<'static> {
        Cookie::build(name.to_string(), token.to_string())
            .path("/")
            .http_only(self.config.http_only)
            .secure(self.config.secure)
            .same_site(parse_same_site(&self.config.same_site))
            .max_age(Duration::days(self.config.lifetime_days))
            .finish()
    }

    /// Empty cookie with the same path and flags, expired in the past.
    pub fn removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.token_cookie(name, "");
        cookie.make_removal();
        cookie
    }

    pub fn set_token_cookies(&self, builder: &mut HttpResponseBuilder, tokens: &TokenResponse) {
        builder.cookie(self.token_cookie(self.auth_cookie_name(), &tokens.access_token));
        if let Some(refresh_token) = &tokens.refresh_token {
            builder.cookie(self.token_cookie(self.refresh_cookie_name(), refresh_token));
        }
    }

    pub fn remove_token_cookies(&self, builder: &mut HttpResponseBuilder) {
        builder.cookie(self.removal_cookie(self.auth_cookie_name()));
        builder.cookie(self.removal_cookie(self.refresh_cookie_name()));
    }

    /// Sets the token cookies. Only development responses echo the tokens
    /// in the body.
    pub fn respond_with_tokens(
        &self,
        tokens: &TokenResponse,
        environment: Environment,
    ) -> HttpResponse {
        let mut builder = HttpResponse::Ok();
        self.set_token_cookies(&mut builder, tokens);

        if environment.is_development() {
            builder.json(tokens)
        } else {
            builder.json(json!({ "message": AUTHENTICATED_MESSAGE }))
        }
    }
}

/// `strict`, `lax` or `none` in any case; anything else is strict.
pub fn parse_same_site(value: &str) -> SameSite {
    match value.trim().to_lowercase().as_str() {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}
