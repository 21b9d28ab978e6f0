// core/common/src/middleware.rs
// Problem-detail translation and bearer authentication middleware

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    http::{header::AUTHORIZATION, StatusCode},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::clock::Clock;
use crate::config::CookieConfig;
use crate::error::ApiError;
use crate::headers::extract_bearer_token;
use crate::logging::redact;
use crate::problem::ErrorTranslator;

// ============================================================================
// PROBLEM DETAILS
// ============================================================================

/// Outermost middleware: every error, whether returned by an inner service
/// or attached to a handler response, leaves as `application/problem+json`.
pub struct ProblemDetails {
    translator: ErrorTranslator,
}

impl ProblemDetails {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            translator: ErrorTranslator::new(clock),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ProblemDetails
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ProblemDetailsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProblemDetailsService {
            service,
            translator: self.translator.clone(),
        }))
    }
}

pub struct ProblemDetailsService<S> {
    service: S,
    translator: ErrorTranslator,
}

impl<S, B> Service<ServiceRequest> for ProblemDetailsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let translator = self.translator.clone();
        let http_req = req.request().clone();
        let fut = self.service.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    let translated = res
                        .response()
                        .error()
                        .map(|err| translator.respond_to(err, res.request().path()));

                    match translated {
                        None => Ok(res.map_into_left_body()),
                        Some(response) => {
                            let response = response.map_err(ErrorInternalServerError)?;
                            let (req, _) = res.into_parts();
                            Ok(ServiceResponse::new(req, response).map_into_right_body())
                        }
                    }
                }
                Err(err) => {
                    let response = translator
                        .respond_to(&err, http_req.path())
                        .map_err(ErrorInternalServerError)?;
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[derive(Clone)]
struct AuthSettings {
    tokens: TokenService,
    auth_cookie_name: String,
    public_paths: Vec<String>,
}

/// Verifies the bearer token (header first, then the auth cookie) and
/// stores its claims in the request extensions.
#[derive(Clone)]
pub struct AuthMiddleware {
    settings: AuthSettings,
}

impl AuthMiddleware {
    pub fn new(tokens: TokenService, cookies: &CookieConfig) -> Self {
        Self {
            settings: AuthSettings {
                tokens,
                auth_cookie_name: cookies.auth_token_cookie_name.clone(),
                public_paths: Vec::new(),
            },
        }
    }

    /// Requests whose path starts with `prefix` skip authentication.
    pub fn public_path(mut self, prefix: impl Into<String>) -> Self {
        self.settings.public_paths.push(prefix.into());
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            settings: Rc::new(self.settings.clone()),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    settings: Rc<AuthSettings>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let settings = self.settings.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let path = req.path();
            if settings.public_paths.iter().any(|p| path.starts_with(p.as_str())) {
                return service.call(req).await;
            }

            let token = request_token(&req, &settings.auth_cookie_name)?;
            let claims = settings
                .tokens
                .decode(&token, &settings.tokens.symmetric_key())
                .map_err(ApiError::from)?;

            tracing::debug!(
                path = %req.path(),
                token = %redact(&token),
                "Request authenticated"
            );

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn request_token(req: &ServiceRequest, cookie_name: &str) -> Result<String, ApiError> {
    if let Some(header) = req.headers().get(AUTHORIZATION) {
        let header = header
            .to_str()
            .map_err(|_| crate::headers::HeaderError::InvalidFormat)?;
        return Ok(extract_bearer_token(header)?);
    }

    match req.cookie(cookie_name) {
        Some(cookie) if !cookie.value().is_empty() => Ok(cookie.value().to_string()),
        _ => Err(
            ApiError::general(StatusCode::UNAUTHORIZED, "Authentication is required")
                .with_title("Unauthorized"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RequestUser;
    use crate::clock::ManualClock;
    use crate::config::TokenConfig;
    use crate::extract::json_config;
    use crate::problem::{ProblemDetail, PROBLEM_JSON};
    use actix_web::cookie::Cookie;
    use actix_web::http::header::CONTENT_TYPE;
    use actix_web::{test, web, App, HttpResponse};
    use chrono::{Duration, TimeZone, Utc};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct NewUser {
        #[allow(dead_code)]
        email: String,
    }

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().body("success")
    }

    async fn missing_handler() -> Result<HttpResponse, ApiError> {
        Err(ApiError::not_found("Order 42 was not found"))
    }

    async fn foreign_handler() -> Result<HttpResponse, Error> {
        Err(actix_web::error::ErrorBadGateway("upstream password=hunter2"))
    }

    async fn whoami(user: RequestUser) -> HttpResponse {
        HttpResponse::Ok().body(user.username)
    }

    async fn create_user(_body: web::Json<NewUser>) -> HttpResponse {
        HttpResponse::Created().finish()
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        ))
    }

    fn token_service(clock: Arc<ManualClock>) -> TokenService {
        TokenService::new(
            TokenConfig {
                secret: "middleware-test-secret".to_string(),
                default_token_expiration: 60,
                rsa_private_key_path: None,
                rsa_public_key_path: None,
            },
            clock,
        )
    }

    #[actix_web::test]
    async fn test_problem_details_passes_success_through() {
        let app = test::init_service(
            App::new()
                .wrap(ProblemDetails::new(clock()))
                .route("/ok", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ok").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, "success");
    }

    #[actix_web::test]
    async fn test_problem_details_translates_handler_error() {
        let clock = clock();
        let app = test::init_service(
            App::new()
                .wrap(ProblemDetails::new(clock.clone()))
                .route("/api/orders/42", web::get().to(missing_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/orders/42").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), PROBLEM_JSON);

        let problem: ProblemDetail = test::read_body_json(resp).await;
        assert_eq!(problem.title, "Not Found");
        assert_eq!(problem.detail, "Order 42 was not found");
        assert_eq!(problem.instance, "/api/orders/42");
        assert_eq!(problem.timestamp, clock.now());
    }

    #[actix_web::test]
    async fn test_problem_details_hides_foreign_errors() {
        let app = test::init_service(
            App::new()
                .wrap(ProblemDetails::new(clock()))
                .route("/proxy", web::get().to(foreign_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/proxy").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("Internal Server Error"));
    }

    #[actix_web::test]
    async fn test_malformed_json_is_validation_error() {
        let app = test::init_service(
            App::new()
                .wrap(ProblemDetails::new(clock()))
                .app_data(json_config())
                .route("/users", web::post().to(create_user)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .insert_header((CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let problem: ProblemDetail = test::read_body_json(resp).await;
        let params = problem.invalid_params.unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "body");
    }

    #[actix_web::test]
    async fn test_auth_middleware_allows_public_path() {
        let clock = clock();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(token_service(clock), &CookieConfig::default()).public_path("/health"))
                .route("/health", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_auth_middleware_public_paths_accumulate() {
        let clock = clock();
        let base = AuthMiddleware::new(token_service(clock), &CookieConfig::default())
            .public_path("/health");
        let extended = base.clone().public_path("/docs");
        let app = test::init_service(
            App::new()
                .wrap(extended)
                .route("/health", web::get().to(ok_handler))
                .route("/docs", web::get().to(ok_handler))
                .route("/protected", web::get().to(ok_handler)),
        )
        .await;

        for uri in ["/health", "/docs"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success(), "{} should be public", uri);
        }

        let req = test::TestRequest::get().uri("/protected").to_request();
        assert!(test::try_call_service(&app, req).await.is_err());
        assert_eq!(base.settings.public_paths, vec!["/health".to_string()]);
    }

    #[actix_web::test]
    async fn test_auth_middleware_rejects_missing_token() {
        let clock = clock();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(token_service(clock), &CookieConfig::default()))
                .route("/protected", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/protected").to_request();
        let err = test::try_call_service(&app, req)
            .await
            .expect_err("Expected service to return error");

        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_missing_token_renders_problem_detail() {
        let clock = clock();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(token_service(clock.clone()), &CookieConfig::default()))
                .wrap(ProblemDetails::new(clock))
                .route("/protected", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/protected").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), PROBLEM_JSON);

        let problem: ProblemDetail = test::read_body_json(resp).await;
        assert_eq!(problem.title, "Unauthorized");
        assert_eq!(problem.instance, "/protected");
    }

    #[actix_web::test]
    async fn test_auth_middleware_accepts_valid_token() {
        let clock = clock();
        let tokens = token_service(clock.clone());
        let token = tokens.create_standard_token("alice", &["admin"]).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(tokens, &CookieConfig::default()))
                .wrap(ProblemDetails::new(clock))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(test::read_body(resp).await, "alice");
    }

    #[actix_web::test]
    async fn test_auth_middleware_reads_cookie() {
        let clock = clock();
        let tokens = token_service(clock.clone());
        let token = tokens.create_standard_token("bob", &["reader"]).unwrap();
        let cookies = CookieConfig::default();

        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(tokens, &cookies))
                .wrap(ProblemDetails::new(clock))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .cookie(Cookie::new(cookies.auth_token_cookie_name.clone(), token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(test::read_body(resp).await, "bob");
    }

    #[actix_web::test]
    async fn test_expired_token_is_token_error() {
        let clock = clock();
        let tokens = token_service(clock.clone());
        let token = tokens.create_standard_token("alice", &["admin"]).unwrap();
        clock.advance(Duration::seconds(61));

        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(tokens, &CookieConfig::default()))
                .wrap(ProblemDetails::new(clock))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let problem: ProblemDetail = test::read_body_json(resp).await;
        assert_eq!(problem.title, "Token Error");
    }

    #[actix_web::test]
    async fn test_malformed_authorization_header() {
        let clock = clock();
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(token_service(clock.clone()), &CookieConfig::default()))
                .wrap(ProblemDetails::new(clock))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Token abc"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
