use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    application::{AccountError, dto::LoginRequest},
    domain::{
        entities::{Account, AnalyticsEvent, ApiCredential},
        repositories::AccountStore,
    },
    infrastructure::{
        analytics::AnalyticsSink,
        security::{PasswordHashError, PasswordHashing},
    },
};

/// An authenticated account and the API key it should use from now on.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub account: Account,
    pub credential: ApiCredential,
}

/// Use case for checking a password and handing out a usable API key
#[derive(Clone)]
pub struct LoginUseCase {
    accounts: Arc<dyn AccountStore>,
    hasher: Arc<dyn PasswordHashing>,
    analytics: AnalyticsSink,
}

impl LoginUseCase {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: Arc<dyn PasswordHashing>,
        analytics: AnalyticsSink,
    ) -> Self {
        Self { accounts, hasher, analytics }
    }

    /// The current key is returned unless it is missing or close to expiry,
    /// in which case a fresh one replaces it.
    pub async fn execute(&self, request: LoginRequest) -> Result<LoggedIn, AccountError> {
        let (identifier, password) = request.into_credentials()?;

        let Some(mut account) = self.accounts.find_account(&identifier).await? else {
            info!(%identifier, "Login for unknown account");
            return Err(AccountError::InvalidLogin);
        };

        let hasher = Arc::clone(&self.hasher);
        let stored = account.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))?;

        match verified {
            Ok(true) => {}
            Ok(false) => {
                warn!(account = %account.id, "Login with wrong password");
                return Err(AccountError::InvalidLogin);
            }
            Err(e) => {
                error!(account = %account.id, error = %e, "Stored password hash is unusable");
                return Err(AccountError::InvalidLogin);
            }
        }

        let now = Utc::now();
        let credential = match self.accounts.current_credential(account.id).await? {
            Some(current) if !current.needs_rotation(now) => current,
            _ => {
                let fresh = ApiCredential::issue(account.id, now);
                self.accounts.rotate_key(&fresh).await?;
                account.api_key = Some(fresh.key.clone());
                account.updated_at = now;
                fresh
            }
        };

        info!(account = %account.id, "Logged in");
        self.analytics.record(AnalyticsEvent::logged_in(account.id, &account.email, &account.username));

        Ok(LoggedIn { account, credential })
    }
}
