//! Error types and result aliases for campus-auth.
//!
//! This module provides the error taxonomy shared by every authentication path:
//! - Transport failures that a consuming gateway may retry once
//! - Terminal protocol failures from the SSO bridge, each carrying the detail
//!   needed to diagnose it without retrying
//! - Device-flow outcomes that are not a token (consent, expiry, rejection)
//! - Ambient configuration and storage failures

use thiserror::Error;

/// Main error type for campus-auth operations.
///
/// Each variant includes a user-friendly message. Use
/// [`requires_reauth`](Self::requires_reauth) and [`is_retriable`](Self::is_retriable)
/// to decide how a caller should react.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No usable credential is stored for the account.
    #[error("Not authenticated as '{account}'. Run 'campus-auth auth login --account {account}' first.")]
    NotAuthenticated {
        /// Account identifier that was looked up.
        account: String,
    },

    /// Network error during an HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// An individual HTTP request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// The SSO entry redirect landed somewhere other than the identity provider.
    #[error("Expected the identity provider at '{expected}', but the login redirect ended at {actual}")]
    ProtocolMismatch {
        /// Host that was expected.
        expected: String,
        /// URL that was actually reached.
        actual: String,
    },

    /// A page or response did not contain the structure we scrape for.
    #[error("Could not parse {what}: {detail}")]
    ParseError {
        /// What was being parsed.
        what: &'static str,
        /// Parser detail or raw fragment.
        detail: String,
    },

    /// The account is federated to a third identity system.
    #[error("Federated login is not supported (account redirects to {url}). Use the device-code login instead.")]
    FederationNotSupported {
        /// Federation redirect advertised by the identity provider.
        url: String,
    },

    /// The identity provider rejected the credentials.
    #[error("Identity provider rejected the sign-in ({code}): {description}")]
    AuthFailed {
        /// Provider error code (e.g. `AADSTS50126`).
        code: String,
        /// Human readable description from the page.
        description: String,
    },

    /// The tenant demands an interactive challenge we cannot script.
    #[error("The sign-in requires an interactive challenge ({challenge}) that cannot be completed headlessly. Use the device-code login instead.")]
    ChallengeNotSupported {
        /// Marker of the challenge page that was reached.
        challenge: String,
    },

    /// The SAML round trip did not land back on the platform.
    #[error("SSO flow did not complete. Final URL: {url}")]
    SsoIncomplete {
        /// URL the flow ended on.
        url: String,
    },

    /// A response had a status we do not know how to continue from.
    #[error("Unexpected response from {endpoint} (HTTP {status})")]
    UnexpectedResponse {
        /// Endpoint that answered.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The platform's launch redirect carried no token.
    #[error("No token in the launch redirect: {location}")]
    NoTokenInRedirect {
        /// Redirect target that was inspected.
        location: String,
    },

    /// The decoded launch token did not have the expected shape.
    #[error("Unexpected launch token format: {fragment}")]
    MalformedToken {
        /// Leading fragment of the decoded value.
        fragment: String,
    },

    /// The tenant requires an administrator to consent to the client.
    #[error("Admin consent is required for this application. Ask your IT admin to grant consent for the app, or set CAMPUS_AUTH_CLIENT_ID to a client ID that has been pre-approved in your tenant. Details: {description}")]
    ConsentRequired {
        /// Error description returned by the token endpoint.
        description: String,
    },

    /// The device code expired before the user completed authorization.
    #[error("Device authorization code expired. Please run 'campus-auth auth login' again and complete authorization within the time limit.")]
    DeviceCodeExpired,

    /// The token endpoint rejected the device code.
    #[error("Device code authorization failed: {code} - {description}")]
    DeviceFlowFailed {
        /// OAuth2 error code.
        code: String,
        /// OAuth2 error description.
        description: String,
    },

    /// Failed to read or write the credential file.
    #[error("Failed to access credential storage: {0}. Check the file permissions.")]
    CredentialStorage(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Data serialization error: {0}. This may indicate corrupted data.")]
    Serialization(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Checks if this error can be resolved by authenticating again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated { .. }
                | Self::DeviceCodeExpired
                | Self::AuthFailed { .. }
                | Self::SsoIncomplete { .. }
        )
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    ///
    /// Only transport-level failures qualify. Every protocol failure is terminal.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}
