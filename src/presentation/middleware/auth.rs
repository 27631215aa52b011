use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    api_key::KeyValidator,
    error::AppError,
    rate_limit::KeyedRateLimiter,
    session_token::{JwtService, SessionClaims, TokenError},
};
use crate::domain::{
    entities::{AccountId, ApiCredential},
    value_objects::ApiKeyValue,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const OWNER_ID_HEADER: &str = "x-user-id";

/// Why a request was refused at the gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing {0}")]
    MissingCredential(&'static str),

    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Session token has expired")]
    ExpiredToken,

    #[error("Session token signature is invalid")]
    InvalidSignature,

    #[error("X-User-ID must be an integer")]
    InvalidOwnerId,

    #[error("Failed to find API key")]
    CredentialNotFound,

    #[error("API key has expired")]
    CredentialExpired,

    #[error("Session token and API key belong to different accounts")]
    CredentialMismatch,

    #[error("Invalid login credentials")]
    InvalidLogin,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("Credential lookup timed out")]
    LookupTimeout,

    #[error("Credential store failure: {0}")]
    Store(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidOwnerId => StatusCode::BAD_REQUEST,
            Self::CredentialMismatch => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::LookupTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable reason carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "missing_credential",
            Self::MalformedCredential(_) => "malformed_credential",
            Self::ExpiredToken => "expired_token",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidOwnerId => "invalid_owner_id",
            Self::CredentialNotFound => "credential_not_found",
            Self::CredentialExpired => "credential_expired",
            Self::CredentialMismatch => "credential_mismatch",
            Self::InvalidLogin => "invalid_login",
            Self::RateLimited { .. } => "rate_limited",
            Self::LookupTimeout => "timeout",
            Self::Store(_) => "internal_error",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::InvalidSignature => Self::InvalidSignature,
            TokenError::Malformed(msg) => Self::MalformedCredential(msg),
            TokenError::Encoding(msg) => Self::Store(msg),
        }
    }
}

/// Which credentials a route demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    Session,
    ApiKey,
    SessionAndApiKey,
}

impl AuthRequirement {
    fn needs_session(self) -> bool {
        matches!(self, Self::Session | Self::SessionAndApiKey)
    }

    fn needs_api_key(self) -> bool {
        matches!(self, Self::ApiKey | Self::SessionAndApiKey)
    }
}

/// Raw credential headers pulled off a request.
#[derive(Debug, Clone, Default)]
pub struct CredentialHeaders {
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub owner_id: Option<String>,
}

impl CredentialHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            authorization: read(AUTHORIZATION.as_str()),
            api_key: read(API_KEY_HEADER),
            owner_id: read(OWNER_ID_HEADER),
        }
    }
}

/// Identity established by the gate, available to handlers as an extractor.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: AccountId,
    pub session: Option<SessionClaims>,
    pub credential: Option<ApiCredential>,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| AppError::Internal {
            message: "route is not behind the authentication gate".to_string(),
        })
    }
}

/// Session token check, API key check and per-key rate limit, in that order.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<JwtService>,
    keys: KeyValidator,
    limiter: Arc<KeyedRateLimiter>,
}

impl AuthGate {
    pub fn new(tokens: Arc<JwtService>, keys: KeyValidator, limiter: Arc<KeyedRateLimiter>) -> Self {
        Self { tokens, keys, limiter }
    }

    pub async fn authorize(
        &self,
        headers: &CredentialHeaders,
        requirement: AuthRequirement,
    ) -> Result<Principal, AuthError> {
        self.authorize_at(headers, requirement, Utc::now()).await
    }

    /// Run every check `requirement` names, stopping at the first failure.
    ///
    /// The credential's last-used time is updated only once the request has
    /// been admitted by the rate limiter, and never delays the response.
    pub async fn authorize_at(
        &self,
        headers: &CredentialHeaders,
        requirement: AuthRequirement,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthError> {
        let session =
            if requirement.needs_session() { Some(self.verify_session(headers, now)?) } else { None };

        let credential = if requirement.needs_api_key() {
            let (owner, key) = Self::key_headers(headers)?;
            let credential = self.keys.validate(owner, &key, now).await?;

            let subject = session.as_ref().map(SessionClaims::account_id).transpose()?;
            if subject.is_some_and(|subject| subject != credential.owner) {
                warn!(owner = %owner, "Session subject does not own the API key");
                return Err(AuthError::CredentialMismatch);
            }

            if !self.limiter.admit(credential.key.as_str()) {
                warn!(owner = %owner, key = %key, "Rate limit exceeded");
                return Err(AuthError::RateLimited { retry_after: self.limiter.retry_after() });
            }

            self.keys.record_use(&credential, now);
            Some(credential)
        } else {
            None
        };

        let account_id = match (&credential, &session) {
            (Some(credential), _) => credential.owner,
            (None, Some(claims)) => claims.account_id().map_err(AuthError::from)?,
            (None, None) => return Err(AuthError::MissingCredential("credentials")),
        };

        debug!(account_id = %account_id, ?requirement, "Request authenticated");
        Ok(Principal { account_id, session, credential })
    }

    fn verify_session(
        &self,
        headers: &CredentialHeaders,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthError> {
        let value =
            headers.authorization.as_deref().ok_or(AuthError::MissingCredential("Authorization header"))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::MalformedCredential("Invalid authorization format".to_string()))?;

        let claims = self.tokens.verify_at(token, now)?;
        claims.account_id()?;
        Ok(claims)
    }

    fn key_headers(headers: &CredentialHeaders) -> Result<(AccountId, ApiKeyValue), AuthError> {
        let key = headers.api_key.as_deref().ok_or(AuthError::MissingCredential("API key"))?;
        let owner = headers.owner_id.as_deref().ok_or(AuthError::MissingCredential("X-User-ID header"))?;
        let owner = owner.parse::<AccountId>().map_err(|_| AuthError::InvalidOwnerId)?;

        Ok((owner, ApiKeyValue::new(key)))
    }
}

/// Middleware for routes that need both a session token and an API key.
pub async fn require_session_and_api_key(
    State(gate): State<AuthGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate_request(&gate, AuthRequirement::SessionAndApiKey, request, next).await
}

/// Middleware for routes that only need an API key.
pub async fn require_api_key(
    State(gate): State<AuthGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate_request(&gate, AuthRequirement::ApiKey, request, next).await
}

async fn gate_request(
    gate: &AuthGate,
    requirement: AuthRequirement,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = CredentialHeaders::from_headers(request.headers());
    let principal = gate.authorize(&headers, requirement).await?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
