// core/common/src/lib.rs
// API Commons - shared building blocks for actix-web REST services

pub mod auth;
pub mod cache;
pub mod claims;
pub mod clock;
pub mod collections;
pub mod config;
pub mod cookies;
pub mod date_format;
pub mod error;
pub mod extract;
pub mod headers;
pub mod logging;
pub mod mfa;
pub mod middleware;
pub mod notifications;
pub mod problem;
pub mod strings;
pub mod templates;
pub mod validation;

// Re-export commonly used items
pub use auth::{generate_refresh_token, DecodedToken, SigningKey, TokenError, TokenResponse, TokenService};
pub use cache::MemoryCache;
pub use claims::{ClaimSet, RequestUser};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collections::{OptionExt, PageRequest, VecExt};
pub use config::{CommonsConfig, CookieConfig, Environment, MfaConfig, NotificationsConfig, TokenConfig};
pub use cookies::AuthCookies;
pub use error::{ApiError, ErrorKind, InvalidParam};
pub use extract::{json_config, path_config, query_config};
pub use headers::{client_ip, decode_basic_authorization, extract_bearer_token, Credentials, HeaderError};
pub use logging::{init_console_logging, init_logging};
pub use mfa::{MfaError, MfaService};
pub use middleware::{AuthMiddleware, ProblemDetails};
pub use notifications::{AccountMailer, Email, MailTransport};
pub use problem::{ErrorTranslator, ProblemDetail};
pub use strings::to_title_case;
pub use templates::{render, ResourceCache, TemplateError};
pub use validation::{
    validate_date_range, validate_email, validate_file_extension, validate_file_size,
    validate_max_length, validate_no_xss, validate_password, validate_required,
    ValidationError, Validator,
};
