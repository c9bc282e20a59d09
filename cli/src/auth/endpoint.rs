//! OAuth2 token endpoint access.
//!
//! [`TokenEndpoint`] is the seam between the device flow / refresher state
//! machines and the wire. [`HttpTokenEndpoint`] speaks the form-encoded
//! protocol to the configured tenant.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::OAuthConfig;
use crate::error::{AuthError, Result};

/// Grant type for polling a device code.
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Device authorization response.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    /// Code the client polls with.
    pub device_code: String,
    /// Code the user types at the verification page.
    pub user_code: String,
    /// Page the user visits.
    pub verification_uri: String,
    /// Seconds between polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds until the device code expires.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    /// Ready-made instructions, when the provider sends them.
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_interval() -> u64 {
    5
}

const fn default_expires_in() -> u64 {
    900
}

/// Body of a token endpoint response, success or error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Issued access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Issued or rotated refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// OAuth2 error code.
    #[serde(default)]
    pub error: Option<String>,
    /// OAuth2 error description.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Error code, or an empty string when absent.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    /// Error description, or an empty string when absent.
    #[must_use]
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or_default()
    }
}

/// Token endpoint operations (enables mocking in tests).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Starts a device authorization.
    async fn request_device_code(&self) -> Result<DeviceCodeResponse>;

    /// Polls the token endpoint with a device code.
    ///
    /// OAuth2 error bodies are returned as `Ok`; only transport failures and
    /// unparseable bodies are errors.
    async fn poll_device_code(&self, device_code: &str) -> Result<TokenResponse>;

    /// Exchanges a refresh token for a new token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// [`TokenEndpoint`] over HTTP.
pub struct HttpTokenEndpoint {
    client: Client,
    client_id: String,
    scope: String,
    device_code_url: Url,
    token_url: Url,
}

impl HttpTokenEndpoint {
    /// Create an endpoint client for the configured tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URLs cannot be built.
    pub fn new(client: Client, config: &OAuthConfig) -> Result<Self> {
        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            device_code_url: config.device_code_url()?,
            token_url: config.token_url()?,
        })
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|_| AuthError::UnexpectedResponse {
            endpoint: self.token_url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        tracing::debug!(url = %self.device_code_url, "Requesting device code");
        let response = self
            .client
            .post(self.device_code_url.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenResponse = response.json().await.unwrap_or_default();
            return Err(AuthError::DeviceFlowFailed {
                code: body
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("http_{}", status.as_u16())),
                description: body.description().to_string(),
            });
        }

        response.json().await.map_err(|e| AuthError::ParseError {
            what: "device code response",
            detail: e.to_string(),
        })
    }

    async fn poll_device_code(&self, device_code: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("grant_type", DEVICE_CODE_GRANT),
            ("device_code", device_code),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.scope.as_str()),
        ])
        .await
    }
}
