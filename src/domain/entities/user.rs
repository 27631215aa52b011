use chrono::{DateTime, Utc};

use crate::domain::entities::{AccountId, ApiCredential};
use crate::domain::value_objects::ApiKeyValue;

/// Registration input, with the password already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub preferred_name: Option<String>,
    /// PHC-format hash; the salt travels inside it.
    pub password_hash: String,
}

/// An account row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub api_key: Option<ApiKeyValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile created alongside an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub account: AccountId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub date_joined: DateTime<Utc>,
}

/// Everything a successful registration produces.
#[derive(Debug, Clone)]
pub struct RegisteredAccount {
    pub account: Account,
    pub profile: Profile,
    pub credential: ApiCredential,
}

/// How a login names its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Username(String),
}

impl std::fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email(email) => write!(f, "email {email}"),
            Self::Username(username) => write!(f, "username {username}"),
        }
    }
}
