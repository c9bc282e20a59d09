//! Access token renewal through the refresh-token grant.

use chrono::Utc;

use crate::auth::credentials::CredentialStore;
use crate::auth::endpoint::TokenEndpoint;
use crate::auth::tokens::{Credential, TokenSet};

/// Hands out currently valid access tokens, refreshing them when near expiry.
///
/// Refresh failures are not errors here: callers get `None` and decide whether
/// to fall back to an interactive login.
pub struct TokenRefresher<'a> {
    endpoint: &'a dyn TokenEndpoint,
    store: &'a CredentialStore,
}

impl<'a> TokenRefresher<'a> {
    /// Create a refresher that persists renewed tokens to `store`.
    #[must_use]
    pub fn new(endpoint: &'a dyn TokenEndpoint, store: &'a CredentialStore) -> Self {
        Self { endpoint, store }
    }

    /// Valid access token for the credential stored under `account`.
    pub async fn access_token_for(&self, account: &str) -> Option<String> {
        let credential = self.store.load(account)?;
        self.access_token(account, &credential).await
    }

    /// Valid access token for `credential`, refreshing it if needed.
    ///
    /// Returns the cached token while `now < expires_at - margin`. Otherwise
    /// exchanges the refresh token, persists the renewed set under `account`
    /// and returns the new access token.
    pub async fn access_token(&self, account: &str, credential: &Credential) -> Option<String> {
        let Credential::OAuth2(tokens) = credential else {
            return None;
        };

        if !tokens.is_expired() {
            return Some(tokens.access_token.clone());
        }

        let renewed = self.refresh(tokens).await?;
        let access_token = renewed.access_token.clone();

        if let Err(e) = self.store.save(account, &Credential::OAuth2(renewed)) {
            tracing::warn!(account, "Refreshed token could not be persisted: {e}");
        }

        Some(access_token)
    }

    async fn refresh(&self, tokens: &TokenSet) -> Option<TokenSet> {
        let refresh_token = tokens.refresh_token.as_deref()?;
        tracing::info!("Refreshing OAuth2 access token...");

        let body = match self.endpoint.refresh(refresh_token).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Token refresh failed: {e}");
                return None;
            }
        };

        let Some(access_token) = body.access_token else {
            tracing::warn!(
                error = body.error.as_deref().unwrap_or("missing access_token"),
                "Token refresh failed: {}",
                body.error_description.as_deref().unwrap_or_default()
            );
            return None;
        };

        tracing::info!("Token refreshed successfully.");
        Some(TokenSet::issued_at(
            Utc::now(),
            access_token,
            body.refresh_token.or_else(|| tokens.refresh_token.clone()),
            body.expires_in,
        ))
    }
}
