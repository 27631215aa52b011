use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::entities::AccountId;

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Account identifier, as a decimal string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn new(account: AccountId, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: account.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
        }
    }

    /// A token is valid strictly before its `exp` second.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    pub fn account_id(&self) -> Result<AccountId, TokenError> {
        self.sub
            .parse::<AccountId>()
            .map_err(|_| TokenError::Malformed("subject is not an account identifier".to_string()))
    }
}

/// Session lifetime chosen at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOption {
    Always,
    Daily,
    Weekly,
    Monthly,
    Never,
}

impl SessionOption {
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        match self {
            Self::Always => Duration::days(366),
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
            Self::Never => Duration::minutes(1),
        }
    }
}

impl FromStr for SessionOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "never" => Ok(Self::Never),
            _ => Err(format!("Invalid session option: {s}")),
        }
    }
}

/// Session token failures, kept distinct so callers can report them apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token encoding error: {0}")]
    Encoding(String),
}

/// HS256 session token issuer and verifier
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn encode_claims(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            error!("Failed to encode session token: {}", e);
            TokenError::Encoding(e.to_string())
        })
    }

    /// Issue a token for `account` whose lifetime follows `option`.
    pub fn issue_session_token(
        &self,
        account: AccountId,
        option: SessionOption,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.encode_claims(&SessionClaims::new(account, now, option.lifetime()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Check the signature, then the expiry relative to `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Failed to decode session token: {}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    _ => TokenError::Malformed(e.to_string()),
                }
            })?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
