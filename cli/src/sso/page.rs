//! Facts scraped from identity-provider pages and platform redirects.
//!
//! Everything that depends on vendor markup lives here so it can be tested
//! against captured fragments without any HTTP.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AuthError, Result};

static CONFIG_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$Config\s*=\s*(\{.*?\});").expect("valid regex"));

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AADSTS\d+").expect("valid regex"));

static ERROR_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""sErrTxt"\s*:\s*"([^"]+)""#).expect("valid regex"));

static REDIRECT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"token=([A-Za-z0-9+/=_-]+)").expect("valid regex"));

const AUTH_ERROR_MARKER: &str = "AADSTS";
const INTERRUPT_MARKERS: [&str; 2] = ["KmsiInterrupt", "StaySignedIn"];
const CHALLENGE_MARKERS: [&str; 3] = ["ConvergedTFA", "arrUserProofs", "ConvergedProofUpRedirect"];

/// The parts of a login page's embedded `$Config` object the flow needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageConfig {
    /// Flow token correlating the login steps.
    #[serde(rename = "sFT")]
    pub flow_token: String,
    /// Session context.
    #[serde(rename = "sCtx", default)]
    pub context: Option<String>,
    /// Anti-forgery value.
    #[serde(default)]
    pub canary: Option<String>,
    /// Where the page's form posts to, absolute or relative.
    #[serde(rename = "urlPost")]
    pub post_url: String,
}

impl PageConfig {
    /// Parse the `$Config = {...};` blob out of a page.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ParseError`] if the blob is missing, is not JSON,
    /// or lacks `sFT`/`urlPost`.
    pub fn extract(body: &str) -> Result<Self> {
        let blob = CONFIG_BLOB
            .captures(body)
            .and_then(|c| c.get(1))
            .ok_or_else(|| AuthError::ParseError {
                what: "login page configuration",
                detail: "no $Config block in page".to_string(),
            })?;

        serde_json::from_str(blob.as_str()).map_err(|e| AuthError::ParseError {
            what: "login page configuration",
            detail: e.to_string(),
        })
    }

    /// Session context, empty when the page had none.
    #[must_use]
    pub fn context(&self) -> &str {
        self.context.as_deref().unwrap_or_default()
    }

    /// Canary, empty when the page had none.
    #[must_use]
    pub fn canary(&self) -> &str {
        self.canary.as_deref().unwrap_or_default()
    }
}

/// A sign-in rejection reported on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    /// `AADSTSnnnnn` code, or `unknown`.
    pub code: String,
    /// Message shown to the user, or a generic one.
    pub description: String,
}

impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        Self::AuthFailed {
            code: failure.code,
            description: failure.description,
        }
    }
}

/// The sign-in error reported by `body`, if any.
#[must_use]
pub fn auth_failure(body: &str) -> Option<AuthFailure> {
    if !body.contains(AUTH_ERROR_MARKER) {
        return None;
    }

    let code = ERROR_CODE
        .find(body)
        .map_or_else(|| "unknown".to_string(), |m| m.as_str().to_string());
    let description = ERROR_TEXT
        .captures(body)
        .and_then(|c| c.get(1))
        .map_or_else(
            || "authentication failed".to_string(),
            |m| m.as_str().to_string(),
        );

    Some(AuthFailure { code, description })
}

/// Whether `body` is the "stay signed in?" interrupt.
#[must_use]
pub fn is_interrupt(body: &str) -> bool {
    INTERRUPT_MARKERS.iter().any(|m| body.contains(m))
}

/// The multi-factor or proof-up challenge `body` presents, if any.
#[must_use]
pub fn challenge_marker(body: &str) -> Option<&'static str> {
    CHALLENGE_MARKERS.into_iter().find(|m| body.contains(m))
}

/// The raw `token` query value in a launch redirect target.
#[must_use]
pub fn redirect_token(location: &str) -> Option<&str> {
    REDIRECT_TOKEN
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Answer of the credential-type discovery endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialTypeResponse {
    /// Credential details.
    #[serde(rename = "Credentials", default)]
    pub credentials: Option<CredentialDetails>,
    /// Renewed flow token.
    #[serde(rename = "FlowToken", default)]
    pub flow_token: Option<String>,
}

/// Credential details within [`CredentialTypeResponse`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialDetails {
    /// Set when the account is federated to another identity system.
    #[serde(rename = "FederationRedirectUrl", default)]
    pub federation_redirect_url: Option<String>,
}

impl CredentialTypeResponse {
    /// Federation redirect, when present and non-empty.
    #[must_use]
    pub fn federation_redirect(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.federation_redirect_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<!DOCTYPE html><html><head><script type="text/javascript">//<![CDATA[
$Config={"fShowPersistentCookiesWarning":false,"urlPost":"/organizations/login","sFT":"AQABAAEAAAD--DLA3VO7","sCtx":"rQQIARAA","canary":"PAQABAAEAAAD","iMaxStackForKnockoutAsyncComponents":10000};
//]]></script></head><body></body></html>"#;

    #[test]
    fn extracts_page_config() {
        let config = PageConfig::extract(LOGIN_PAGE).unwrap();
        assert_eq!(config.flow_token, "AQABAAEAAAD--DLA3VO7");
        assert_eq!(config.context(), "rQQIARAA");
        assert_eq!(config.canary(), "PAQABAAEAAAD");
        assert_eq!(config.post_url, "/organizations/login");
    }

    #[test]
    fn config_blob_may_span_lines() {
        let page = "<script>$Config = {\n  \"sFT\": \"ft\",\n  \"urlPost\": \"https://login.example.com/kmsi\"\n};</script>";
        let config = PageConfig::extract(page).unwrap();
        assert_eq!(config.flow_token, "ft");
        assert_eq!(config.context(), "");
        assert_eq!(config.post_url, "https://login.example.com/kmsi");
    }

    #[test]
    fn missing_config_is_parse_error() {
        let result = PageConfig::extract("<html><body>Nothing here</body></html>");
        assert!(matches!(result, Err(AuthError::ParseError { .. })));
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let result = PageConfig::extract(r#"$Config={"sCtx":"c","urlPost":"/login"};"#);
        assert!(matches!(result, Err(AuthError::ParseError { .. })));
    }

    #[test]
    fn detects_auth_failure_with_code_and_text() {
        let page = r#"$Config={"sErrorCode":"50126","sErrTxt":"Your account or password is incorrect.","urlPost":"/login"}; AADSTS50126: Error validating credentials"#;
        let failure = auth_failure(page).unwrap();
        assert_eq!(failure.code, "AADSTS50126");
        assert_eq!(failure.description, "Your account or password is incorrect.");
    }

    #[test]
    fn auth_failure_falls_back_to_generic_text() {
        let failure = auth_failure("Sorry: AADSTS without a number").unwrap();
        assert_eq!(failure.code, "unknown");
        assert_eq!(failure.description, "authentication failed");
        assert!(auth_failure("<html>All good</html>").is_none());
    }

    #[test]
    fn detects_interrupt_and_challenges() {
        assert!(is_interrupt(r#"{"pgid":"KmsiInterrupt"}"#));
        assert!(is_interrupt("<div id=\"StaySignedIn\">"));
        assert!(!is_interrupt("<html></html>"));

        assert_eq!(
            challenge_marker(r#"{"pgid":"ConvergedTFA","arrUserProofs":[]}"#),
            Some("ConvergedTFA")
        );
        assert_eq!(challenge_marker("<html></html>"), None);
    }

    #[test]
    fn extracts_redirect_token() {
        assert_eq!(
            redirect_token("moodlemobile://token=YWJjOjo6ZGVm"),
            Some("YWJjOjo6ZGVm")
        );
        assert_eq!(
            redirect_token("moodlemobile://token=ab+c/d_e-f==&other=1"),
            Some("ab+c/d_e-f==")
        );
        assert_eq!(redirect_token("moodlemobile://launch?error=1"), None);
    }

    #[test]
    fn federation_redirect_requires_non_empty_url() {
        let federated: CredentialTypeResponse = serde_json::from_str(
            r#"{"Credentials":{"FederationRedirectUrl":"https://adfs.example.ac.uk/adfs/ls/"},"FlowToken":"ft2"}"#,
        )
        .unwrap();
        assert_eq!(
            federated.federation_redirect(),
            Some("https://adfs.example.ac.uk/adfs/ls/")
        );
        assert_eq!(federated.flow_token.as_deref(), Some("ft2"));

        let managed: CredentialTypeResponse =
            serde_json::from_str(r#"{"Credentials":{"FederationRedirectUrl":""},"IfExistsResult":0}"#)
                .unwrap();
        assert_eq!(managed.federation_redirect(), None);

        let bare: CredentialTypeResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.federation_redirect(), None);
    }
}
