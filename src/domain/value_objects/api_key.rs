use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix carried by every generated API key.
pub const API_KEY_PREFIX: &str = "sk_";

const KEY_ENTROPY_BYTES: usize = 32;

/// Opaque API key string presented in the `X-API-Key` header.
///
/// `Debug` and `Display` never print the full key; use [`ApiKeyValue::as_str`]
/// where the raw value is genuinely needed (storage lookups, limiter keys).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyValue(String);

impl ApiKeyValue {
    /// Wrap a key received from a client or read from storage.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh key: `sk_` followed by 64 uppercase hex characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_ENTROPY_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(format!("{API_KEY_PREFIX}{}", hex::encode_upper(bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short, stable digest of the key that is safe to put in logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Whether the key has the shape produced by [`ApiKeyValue::generate`].
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.strip_prefix(API_KEY_PREFIX).is_some_and(|rest| {
            rest.len() == KEY_ENTROPY_BYTES * 2
                && rest.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
    }
}

impl fmt::Debug for ApiKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKeyValue").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for ApiKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.fingerprint())
    }
}
