//! Middleware for HTTP request processing: the authentication gate, the
//! per-key rate limiter and error rendering.

pub mod api_key;
pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod session_token;

pub use api_key::KeyValidator;
pub use auth::{AuthError, AuthGate, AuthRequirement, CredentialHeaders, Principal};
pub use error::{AppError, ErrorResponse};
pub use rate_limit::{KeyedRateLimiter, RateLimitConfig};
pub use session_token::{JwtService, SessionClaims, SessionOption, TokenError};
