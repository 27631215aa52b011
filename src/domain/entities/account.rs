use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::value_objects::ApiKeyValue;

/// Days an issued API key stays valid.
pub const KEY_ROTATION_DAYS: i64 = 90;

/// Days before expiry at which a key should be rotated.
pub const ROTATION_WARNING_DAYS: i64 = 7;

/// Account identifier shared by users, posts and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Account identifiers issued by the database are always positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// Long-lived API credential bound to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredential {
    pub owner: AccountId,
    pub key: ApiKeyValue,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiCredential {
    /// Issue a freshly generated key for `owner`, valid for [`KEY_ROTATION_DAYS`].
    #[must_use]
    pub fn issue(owner: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            key: ApiKeyValue::generate(),
            created_at: now,
            expires_at: now + Duration::days(KEY_ROTATION_DAYS),
            last_used_at: None,
        }
    }

    /// A credential is usable strictly before its expiry instant.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= Duration::days(ROTATION_WARNING_DAYS)
    }
}
