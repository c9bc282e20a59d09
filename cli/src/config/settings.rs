//! Application configuration settings.

use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// Main configuration for campus-auth.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth2 device-code and refresh settings.
    pub oauth: OAuthConfig,
    /// SAML2 SSO bridge settings.
    pub sso: SsoConfig,
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Credential store settings.
    pub store: StoreConfig,
}

/// OAuth2 client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authority hosting the tenant endpoints.
    #[serde(deserialize_with = "url_serde::deserialize")]
    pub authority: Url,
    /// Tenant segment of the endpoint paths.
    pub tenant: String,
    /// Public client ID used for the device-code grant.
    pub client_id: String,
    /// Space separated scopes requested for the access token.
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authority: Url::parse("https://login.microsoftonline.com").expect("valid default URL"),
            tenant: "organizations".to_string(),
            client_id: "9e5f94bc-e8a4-4e73-b8be-63364c29d753".to_string(),
            scope: "https://outlook.office365.com/IMAP.AccessAsUser.All offline_access"
                .to_string(),
        }
    }
}

/// SAML2 bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// Base URL of the learning platform.
    #[serde(deserialize_with = "url_serde::deserialize")]
    pub platform_url: Url,
    /// Identity-provider identifier the platform's SAML2 plugin expects.
    pub idp_id: String,
    /// Base URL of the identity provider.
    #[serde(deserialize_with = "url_serde::deserialize")]
    pub identity_provider_url: Url,
    /// Web service name requested from the mobile launch endpoint.
    pub service: String,
    /// URL scheme the launch endpoint redirects to.
    pub url_scheme: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            platform_url: Url::parse("https://qmplus.qmul.ac.uk").expect("valid default URL"),
            idp_id: "4eb950c6f0e1110dc8e14b5cf41532d7".to_string(),
            identity_provider_url: Url::parse("https://login.microsoftonline.com")
                .expect("valid default URL"),
            service: "moodle_mobile_app".to_string(),
            url_scheme: "moodlemobile".to_string(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent presented to the identity provider.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".to_string(),
        }
    }
}

/// Credential store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Overrides the credential file location.
    pub path: Option<PathBuf>,
}

/// Custom serde module for URL fields.
mod url_serde {
    use serde::{self, Deserialize, Deserializer};
    use url::Url;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const CLIENT_ID: &str = "CAMPUS_AUTH_CLIENT_ID";
    pub const PLATFORM_URL: &str = "CAMPUS_AUTH_PLATFORM_URL";
    pub const CREDENTIALS: &str = "CAMPUS_AUTH_CREDENTIALS";
    pub const LOG_LEVEL: &str = "CAMPUS_AUTH_LOG";
    /// Read by `auth password` before falling back to stdin.
    pub const PASSWORD: &str = "CAMPUS_AUTH_PASSWORD";
}

impl AuthConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(client_id) = std::env::var(env::CLIENT_ID) {
            if !client_id.trim().is_empty() {
                self.oauth.client_id = client_id.trim().to_string();
            }
        }

        if let Ok(url) = std::env::var(env::PLATFORM_URL) {
            if let Ok(parsed) = Url::parse(&url) {
                self.sso.platform_url = parsed;
            }
        }

        if let Ok(path) = std::env::var(env::CREDENTIALS) {
            if !path.is_empty() {
                self.store.path = Some(PathBuf::from(path));
            }
        }

        self
    }
}

impl OAuthConfig {
    /// Device-code endpoint for the configured tenant.
    pub fn device_code_url(&self) -> Result<Url, url::ParseError> {
        self.authority
            .join(&format!("{}/oauth2/v2.0/devicecode", self.tenant))
    }

    /// Token endpoint for the configured tenant.
    pub fn token_url(&self) -> Result<Url, url::ParseError> {
        self.authority.join(&format!("{}/oauth2/v2.0/token", self.tenant))
    }
}
