use serde::{Deserialize, Serialize};

use crate::application::ValidationError;
use crate::domain::entities::{Account, ApiCredential, LoginIdentifier, RegisteredAccount};

/// Request body for creating an account
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub username: String,
}

/// A registration that passed validation; the password is still plain text.
pub struct Registration {
    pub email: String,
    pub username: String,
    pub preferred_name: Option<String>,
    pub password: String,
}

impl CreateUserRequest {
    pub fn into_registration(self, min_password_length: usize) -> Result<Registration, ValidationError> {
        let email = self.email.trim().to_string();
        let username = self.username.trim().to_string();

        if email.is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
        if !well_formed {
            return Err(ValidationError::InvalidEmail);
        }
        if username.is_empty() {
            return Err(ValidationError::MissingField("username"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        if self.password.chars().count() < min_password_length {
            return Err(ValidationError::PasswordTooShort(min_password_length));
        }

        Ok(Registration {
            email,
            username,
            preferred_name: self
                .preferred_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            password: self.password,
        })
    }
}

/// Response body for account creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "profileID")]
    pub profile_id: i64,
    pub api_key: String,
    pub token: String,
    pub email: String,
    pub username: String,
    pub preferred_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_joined: String,
    pub created_at: String,
    pub updated_at: String,
}

impl CreateUserResponse {
    pub fn new(registered: &RegisteredAccount, token: String) -> Self {
        let RegisteredAccount { account, profile, credential } = registered;
        Self {
            user_id: account.id.as_i64(),
            profile_id: profile.id,
            api_key: credential.key.as_str().to_string(),
            token,
            email: account.email.clone(),
            username: account.username.clone(),
            preferred_name: profile.preferred_name.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            date_joined: profile.date_joined.to_rfc3339(),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// Request body for logging in with an email or a username
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
    /// Session lifetime: always, daily, weekly, monthly or never.
    pub session_option: Option<String>,
}

impl LoginRequest {
    /// The account to look up (email wins when both are given) and the password.
    pub fn into_credentials(self) -> Result<(LoginIdentifier, String), ValidationError> {
        let non_blank = |value: Option<String>| {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        let identifier = match (non_blank(self.email), non_blank(self.username)) {
            (Some(email), _) => LoginIdentifier::Email(email),
            (None, Some(username)) => LoginIdentifier::Username(username),
            (None, None) => return Err(ValidationError::MissingField("email or username")),
        };
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }

        Ok((identifier, self.password))
    }
}

/// Response body for a successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub is_password_correct: bool,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub api_key: String,
    pub api_key_expires_at: String,
    pub token: String,
    pub email: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

impl LoginResponse {
    pub fn new(account: &Account, credential: &ApiCredential, token: String) -> Self {
        Self {
            is_password_correct: true,
            user_id: account.id.as_i64(),
            api_key: credential.key.as_str().to_string(),
            api_key_expires_at: credential.expires_at.to_rfc3339(),
            token,
            email: account.email.clone(),
            username: account.username.clone(),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_matches, assert_ok};
    use rstest::rstest;

    fn registration(email: &str, username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            preferred_name: Some("  ".to_string()),
            username: username.to_string(),
        }
    }

    #[test]
    fn registration_is_trimmed_and_blank_names_dropped() {
        let request = registration(" ann@example.com ", " ann ", "long-enough");

        let registration = assert_ok!(request.into_registration(8));

        assert_eq!(registration.email, "ann@example.com");
        assert_eq!(registration.username, "ann");
        assert_eq!(registration.preferred_name, None);
    }

    #[rstest]
    #[case("", "ann", "long-enough", ValidationError::MissingField("email"))]
    #[case("ann.example.com", "ann", "long-enough", ValidationError::InvalidEmail)]
    #[case("@example.com", "ann", "long-enough", ValidationError::InvalidEmail)]
    #[case("ann@example.com", " ", "long-enough", ValidationError::MissingField("username"))]
    #[case("ann@example.com", "ann", "", ValidationError::MissingField("password"))]
    #[case("ann@example.com", "ann", "short", ValidationError::PasswordTooShort(8))]
    fn invalid_registrations_name_the_problem(
        #[case] email: &str,
        #[case] username: &str,
        #[case] password: &str,
        #[case] expected: ValidationError,
    ) {
        let result = registration(email, username, password).into_registration(8);

        assert_eq!(result.err(), Some(expected));
    }

    #[test]
    fn login_prefers_email_over_username() {
        let request = LoginRequest {
            email: Some("ann@example.com".to_string()),
            username: Some("ann".to_string()),
            password: "secret".to_string(),
            session_option: None,
        };

        let (identifier, _) = assert_ok!(request.into_credentials());
        assert_eq!(identifier, LoginIdentifier::Email("ann@example.com".to_string()));
    }

    #[test]
    fn login_needs_an_identifier_and_a_password() {
        let blank = LoginRequest {
            email: Some(" ".to_string()),
            password: "secret".to_string(),
            ..LoginRequest::default()
        };
        assert_matches!(blank.into_credentials(), Err(ValidationError::MissingField(_)));

        let no_password =
            LoginRequest { username: Some("ann".to_string()), ..LoginRequest::default() };
        assert_matches!(
            no_password.into_credentials(),
            Err(ValidationError::MissingField("password"))
        );
    }
}
