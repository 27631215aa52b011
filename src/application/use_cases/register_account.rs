use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    application::{AccountError, dto::CreateUserRequest},
    domain::{
        entities::{AnalyticsEvent, NewAccount, RegisteredAccount},
        repositories::{AccountStore, PersistenceError},
    },
    infrastructure::{
        analytics::AnalyticsSink,
        security::{PasswordHashError, PasswordHashing},
    },
};

/// Use case for creating an account with its profile and first API key
#[derive(Clone)]
pub struct RegisterAccountUseCase {
    accounts: Arc<dyn AccountStore>,
    hasher: Arc<dyn PasswordHashing>,
    analytics: AnalyticsSink,
    min_password_length: usize,
}

impl RegisterAccountUseCase {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: Arc<dyn PasswordHashing>,
        analytics: AnalyticsSink,
        min_password_length: usize,
    ) -> Self {
        Self { accounts, hasher, analytics, min_password_length }
    }

    pub async fn execute(&self, request: CreateUserRequest) -> Result<RegisteredAccount, AccountError> {
        let registration = request.into_registration(self.min_password_length)?;

        let hasher = Arc::clone(&self.hasher);
        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))??;

        let account = NewAccount {
            email: registration.email,
            username: registration.username,
            preferred_name: registration.preferred_name,
            password_hash,
        };

        let registered = match self.accounts.register(&account, Utc::now()).await {
            Ok(registered) => registered,
            Err(PersistenceError::Constraint(detail)) => {
                debug!(username = %account.username, %detail, "Registration collides with an existing account");
                return Err(AccountError::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        let id = registered.account.id;
        info!(account = %id, profile = registered.profile.id, "Account created");
        self.analytics.record(AnalyticsEvent::account_created(
            id,
            &registered.account.email,
            &registered.account.username,
        ));
        self.analytics.record(AnalyticsEvent::profile_created(
            id,
            registered.profile.id,
            registered.profile.preferred_name.as_deref(),
        ));

        Ok(registered)
    }
}
