use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

use super::auth::AuthError;
use crate::domain::{
    entities::{AccountId, ApiCredential},
    repositories::{CredentialStore, StoreError},
    value_objects::ApiKeyValue,
};

/// Validates an `(owner, key)` pair against the credential store.
#[derive(Clone)]
pub struct KeyValidator {
    store: Arc<dyn CredentialStore>,
    lookup_timeout: Duration,
}

impl KeyValidator {
    pub fn new(store: Arc<dyn CredentialStore>, lookup_timeout: Duration) -> Self {
        Self { store, lookup_timeout }
    }

    /// Look the key up for `owner`, reject it if expired, then confirm the
    /// account record agrees that `owner` holds it.
    pub async fn validate(
        &self,
        owner: AccountId,
        key: &ApiKeyValue,
        now: DateTime<Utc>,
    ) -> Result<ApiCredential, AuthError> {
        let credential = self
            .bounded(self.store.find_credential(owner, key))
            .await?
            .ok_or(AuthError::CredentialNotFound)?;

        if !credential.is_valid_at(now) {
            debug!(owner = %owner, key = %key, expired_at = %credential.expires_at, "API key has expired");
            return Err(AuthError::CredentialExpired);
        }

        if !self.bounded(self.store.account_holds_key(owner, key)).await? {
            warn!(owner = %owner, key = %key, "API key is not the account's current key");
            return Err(AuthError::CredentialNotFound);
        }

        if credential.needs_rotation(now) {
            debug!(owner = %owner, key = %key, "API key is due for rotation");
        }

        Ok(credential)
    }

    /// Record the use in the background; failures are logged and never
    /// surface to the request.
    pub fn record_use(&self, credential: &ApiCredential, at: DateTime<Utc>) {
        let store = Arc::clone(&self.store);
        let owner = credential.owner;
        let key = credential.key.clone();

        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(owner, &key, at).await {
                warn!(owner = %owner, key = %key, error = %e, "Failed to update API key last-used time");
            }
        });
    }

    async fn bounded<T>(
        &self,
        lookup: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(error = %e, "Credential store lookup failed");
                Err(AuthError::Store(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_ms = self.lookup_timeout.as_millis() as u64, "Credential store lookup timed out");
                Err(AuthError::LookupTimeout)
            }
        }
    }
}
