//! OAuth device authorization flow implementation (RFC 8628).

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::auth::endpoint::TokenEndpoint;
use crate::auth::tokens::{expiry_after, TokenSet};
use crate::error::{AuthError, Result};

/// Seconds added to the poll interval on each `slow_down`.
pub const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Error description signature of a tenant that requires admin consent.
const CONSENT_REQUIRED_SIGNATURE: &str = "AADSTS65001";

/// A device authorization in progress.
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    /// Code the client polls with.
    pub device_code: String,
    /// Code for the user to enter.
    pub user_code: String,
    /// URL for the user to visit.
    pub verification_uri: String,
    /// Current wait between polls.
    pub interval: Duration,
    /// When the device code stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// Provider-supplied instructions, if any.
    pub message: Option<String>,
}

/// Start the device authorization flow.
///
/// Returns the verification URL and user code for the user to complete authentication.
///
/// # Errors
///
/// Returns an error if the device authorization request fails.
pub async fn start_device_flow(endpoint: &dyn TokenEndpoint) -> Result<DeviceCodeSession> {
    let response = endpoint.request_device_code().await?;

    Ok(DeviceCodeSession {
        device_code: response.device_code,
        user_code: response.user_code,
        verification_uri: response.verification_uri,
        interval: Duration::from_secs(response.interval),
        expires_at: expiry_after(Utc::now(), response.expires_in),
        message: response.message,
    })
}

/// Poll for token completion.
///
/// Sleeps for the session interval before every poll, using `sleep` so callers
/// pass `tokio::time::sleep` and tests pass a recorder. Polling stops at the
/// first terminal answer.
///
/// # Errors
///
/// Returns an error if:
/// - The device code expires ([`AuthError::DeviceCodeExpired`])
/// - The tenant requires admin consent ([`AuthError::ConsentRequired`])
/// - The token endpoint rejects the code ([`AuthError::DeviceFlowFailed`])
/// - A network error occurs
pub async fn poll_for_token<S, F>(
    endpoint: &dyn TokenEndpoint,
    session: &DeviceCodeSession,
    sleep: S,
) -> Result<TokenSet>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut interval = session.interval;

    while Utc::now() < session.expires_at {
        sleep(interval).await;

        let body = endpoint.poll_device_code(&session.device_code).await?;

        if let Some(access_token) = body.access_token {
            tracing::info!("Device authorization completed");
            return Ok(TokenSet::issued_at(
                Utc::now(),
                access_token,
                body.refresh_token,
                body.expires_in,
            ));
        }

        match body.error_code() {
            "authorization_pending" => {
                tracing::debug!("Authorization pending");
            }
            "slow_down" => {
                interval = interval.saturating_add(Duration::from_secs(SLOW_DOWN_STEP_SECS));
                tracing::debug!(interval_secs = interval.as_secs(), "Asked to slow down");
            }
            _ if body.description().contains(CONSENT_REQUIRED_SIGNATURE) => {
                return Err(AuthError::ConsentRequired {
                    description: body.description().to_string(),
                });
            }
            code => {
                return Err(AuthError::DeviceFlowFailed {
                    code: code.to_string(),
                    description: body.description().to_string(),
                });
            }
        }
    }

    Err(AuthError::DeviceCodeExpired)
}

/// Open the verification URL in the default browser.
///
/// Returns `true` if the browser was opened successfully, `false` otherwise.
pub fn open_browser(session: &DeviceCodeSession) -> bool {
    open::that(&session.verification_uri).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::auth::endpoint::{DeviceCodeResponse, MockTokenEndpoint, TokenResponse};

    fn session(interval_secs: u64, expires_in: chrono::Duration) -> DeviceCodeSession {
        DeviceCodeSession {
            device_code: "dev-1".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            verification_uri: "https://microsoft.com/devicelogin".to_string(),
            interval: Duration::from_secs(interval_secs),
            expires_at: Utc::now() + expires_in,
            message: None,
        }
    }

    fn pending() -> TokenResponse {
        TokenResponse {
            error: Some("authorization_pending".to_string()),
            ..TokenResponse::default()
        }
    }

    fn error(code: &str, description: &str) -> TokenResponse {
        TokenResponse {
            error: Some(code.to_string()),
            error_description: Some(description.to_string()),
            ..TokenResponse::default()
        }
    }

    fn success() -> TokenResponse {
        TokenResponse {
            access_token: Some("at-1".to_string()),
            refresh_token: Some("rt-1".to_string()),
            expires_in: Some(3600),
            ..TokenResponse::default()
        }
    }

    /// Endpoint that answers polls from a script, in order.
    fn scripted(responses: Vec<TokenResponse>) -> MockTokenEndpoint {
        let mut endpoint = MockTokenEndpoint::new();
        let script = Arc::new(Mutex::new(responses.into_iter()));
        let count = script.lock().unwrap().len();
        endpoint
            .expect_poll_device_code()
            .times(count)
            .returning(move |code| {
                assert_eq!(code, "dev-1");
                Ok(script.lock().unwrap().next().unwrap())
            });
        endpoint
    }

    /// Sleep function that records requested durations instead of waiting.
    fn recorder() -> (Arc<Mutex<Vec<Duration>>>, impl Fn(Duration) -> std::future::Ready<()>) {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sleeps);
        (sleeps, move |d| {
            log.lock().unwrap().push(d);
            std::future::ready(())
        })
    }

    #[tokio::test]
    async fn start_builds_session_from_response() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_request_device_code().times(1).returning(|| {
            Ok(DeviceCodeResponse {
                device_code: "dev-1".to_string(),
                user_code: "ABCD-EFGH".to_string(),
                verification_uri: "https://microsoft.com/devicelogin".to_string(),
                interval: 7,
                expires_in: 900,
                message: None,
            })
        });

        let session = start_device_flow(&endpoint).await.unwrap();
        assert_eq!(session.interval, Duration::from_secs(7));
        assert!(session.expires_at > Utc::now() + chrono::Duration::seconds(890));
    }

    #[tokio::test]
    async fn start_tolerates_oversized_lifetime() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint.expect_request_device_code().times(1).returning(|| {
            Ok(DeviceCodeResponse {
                device_code: "dev-1".to_string(),
                user_code: "ABCD-EFGH".to_string(),
                verification_uri: "https://microsoft.com/devicelogin".to_string(),
                interval: 5,
                expires_in: u64::MAX,
                message: None,
            })
        });

        let session = start_device_flow(&endpoint).await.unwrap();
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn pending_twice_then_success() {
        let endpoint = scripted(vec![pending(), pending(), success()]);
        let (sleeps, sleep) = recorder();

        let tokens = poll_for_token(&endpoint, &session(5, chrono::Duration::minutes(15)), sleep)
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
        assert!(!tokens.is_expired());
        assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_secs(5); 3]);
    }

    #[tokio::test]
    async fn slow_down_increases_next_interval() {
        let endpoint = scripted(vec![error("slow_down", ""), pending(), success()]);
        let (sleeps, sleep) = recorder();

        poll_for_token(&endpoint, &session(5, chrono::Duration::minutes(15)), sleep)
            .await
            .unwrap();

        let sleeps = sleeps.lock().unwrap();
        assert_eq!(sleeps[0], Duration::from_secs(5));
        assert!(sleeps[1] > sleeps[0]);
        assert_eq!(sleeps[1], Duration::from_secs(10));
        assert_eq!(sleeps[2], Duration::from_secs(10));
    }

    #[tokio::test]
    async fn consent_signature_is_terminal() {
        let endpoint = scripted(vec![error(
            "invalid_grant",
            "AADSTS65001: The user or administrator has not consented to use the application",
        )]);
        let (_, sleep) = recorder();

        let result = poll_for_token(&endpoint, &session(5, chrono::Duration::minutes(15)), sleep).await;
        assert!(matches!(result, Err(AuthError::ConsentRequired { .. })));
    }

    #[tokio::test]
    async fn other_errors_carry_code_and_description() {
        let endpoint = scripted(vec![error("access_denied", "The user declined")]);
        let (_, sleep) = recorder();

        let result = poll_for_token(&endpoint, &session(5, chrono::Duration::minutes(15)), sleep).await;
        match result {
            Err(AuthError::DeviceFlowFailed { code, description }) => {
                assert_eq!(code, "access_denied");
                assert_eq!(description, "The user declined");
            }
            other => panic!("expected DeviceFlowFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_session_times_out_without_polling() {
        let endpoint = scripted(Vec::new());
        let (sleeps, sleep) = recorder();

        let result = poll_for_token(&endpoint, &session(5, chrono::Duration::seconds(-1)), sleep).await;
        assert!(matches!(result, Err(AuthError::DeviceCodeExpired)));
        assert!(sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_surfaced() {
        let mut endpoint = MockTokenEndpoint::new();
        endpoint
            .expect_poll_device_code()
            .times(1)
            .returning(|_| Err(AuthError::Network("connection reset".to_string())));
        let (_, sleep) = recorder();

        let result = poll_for_token(&endpoint, &session(5, chrono::Duration::minutes(15)), sleep).await;
        assert!(matches!(result, Err(AuthError::Network(_))));
    }
}
