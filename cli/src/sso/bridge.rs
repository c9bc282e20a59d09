//! Scripted SAML2 browser sign-in that recovers a platform mobile token.
//!
//! The run is a straight line of HTTP steps, each fed by the page the
//! previous one landed on:
//!
//! 1. Start SAML2 at the platform and land on the identity provider.
//! 2. Read the login page's `$Config`.
//! 3. Discover the credential type; federated accounts stop here.
//! 4. Post the password.
//! 5. Classify the result: error, "stay signed in?" interrupt, or onward.
//! 6. Post the SAML response form back to the platform, if present.
//! 7. Check that the platform was reached.
//! 8. Ask the mobile launch endpoint for a token redirect.
//! 9. Decode the token from the redirect target.
//!
//! Nothing is retried; the first failure ends the run.

use rand::Rng;
use reqwest::StatusCode;
use url::Url;

use crate::config::{HttpConfig, SsoConfig};
use crate::error::{AuthError, Result};
use crate::sso::context::{FlowContext, SsoSession};
use crate::sso::form::PostForm;
use crate::sso::mobile_token::DecodedMobileToken;
use crate::sso::page::{self, CredentialTypeResponse, PageConfig};

/// Hidden field that marks the SAML POST-binding form.
const SAML_RESPONSE_FIELD: &str = "SAMLResponse";

/// Drives the SAML2 sign-in for one platform and identity provider.
pub struct SamlBridge {
    sso: SsoConfig,
    http: HttpConfig,
}

impl SamlBridge {
    /// Create a bridge for the configured platform.
    #[must_use]
    pub const fn new(sso: SsoConfig, http: HttpConfig) -> Self {
        Self { sso, http }
    }

    /// Sign in as `username` and return the platform's mobile token.
    ///
    /// A fresh cookie session is created for the call and dropped when it
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first terminal failure of the flow; see [`AuthError`].
    pub async fn recover_token(&self, username: &str, password: &str) -> Result<DecodedMobileToken> {
        let session = SsoSession::new(&self.http)?;

        let ctx = self.enter_identity_provider(session).await?;
        let config = PageConfig::extract(&ctx.body)?;
        let flow_token = self.discover_credential_type(&ctx, username, &config).await?;
        let ctx = self
            .submit_password(ctx, &config, username, password, &flow_token)
            .await?;
        let ctx = self.pass_interrupt(ctx).await?;
        let ctx = Self::post_saml_response(ctx).await?;

        if !ctx.is_on(&self.sso.platform_url) {
            return Err(AuthError::SsoIncomplete {
                url: ctx.current_url.to_string(),
            });
        }

        let location = self.launch_mobile(&ctx).await?;
        let raw = page::redirect_token(&location)
            .ok_or_else(|| AuthError::NoTokenInRedirect {
                location: location.clone(),
            })?;

        let token = DecodedMobileToken::decode(raw)?;
        tracing::debug!(
            site_signature = %token.passport,
            has_private_token = token.private_token.is_some(),
            "Decoded launch token"
        );
        tracing::info!("Recovered platform token via SSO");
        Ok(token)
    }

    async fn enter_identity_provider(&self, session: SsoSession) -> Result<FlowContext> {
        let mut url = self.platform_endpoint("auth/saml2/login.php")?;
        url.set_query(Some(&format!("wants&idp={}&passive=off", self.sso.idp_id)));
        tracing::debug!(%url, "Starting SAML2 login");

        let response = session.client().get(url).send().await?;
        let ctx = FlowContext::navigate(session, response).await?;

        if !ctx.is_on(&self.sso.identity_provider_url) {
            return Err(AuthError::ProtocolMismatch {
                expected: self
                    .sso
                    .identity_provider_url
                    .host_str()
                    .unwrap_or_default()
                    .to_string(),
                actual: ctx.current_url.to_string(),
            });
        }

        Ok(ctx)
    }

    /// Returns the flow token to continue with.
    async fn discover_credential_type(
        &self,
        ctx: &FlowContext,
        username: &str,
        config: &PageConfig,
    ) -> Result<String> {
        let url = self
            .sso
            .identity_provider_url
            .join("/common/GetCredentialType?mkt=en-US")?;
        tracing::debug!(%url, "Discovering credential type");

        let response = ctx
            .session
            .client()
            .post(url)
            .json(&serde_json::json!({
                "username": username,
                "flowToken": config.flow_token,
                "isOtherIdpSupported": true,
                "checkPhones": false,
            }))
            .send()
            .await?;

        let body = response.text().await?;
        let discovery: CredentialTypeResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::ParseError {
                what: "credential type response",
                detail: e.to_string(),
            })?;

        if let Some(url) = discovery.federation_redirect() {
            return Err(AuthError::FederationNotSupported {
                url: url.to_string(),
            });
        }

        Ok(discovery
            .flow_token
            .unwrap_or_else(|| config.flow_token.clone()))
    }

    async fn submit_password(
        &self,
        ctx: FlowContext,
        config: &PageConfig,
        username: &str,
        password: &str,
        flow_token: &str,
    ) -> Result<FlowContext> {
        let url = self.resolve_post_url(&config.post_url)?;
        tracing::debug!(%url, "Submitting password");

        let response = ctx
            .session
            .client()
            .post(url)
            .form(&[
                ("login", username),
                ("loginfmt", username),
                ("passwd", password),
                ("type", "11"),
                ("LoginOptions", "3"),
                ("canary", config.canary()),
                ("ctx", config.context()),
                ("flowToken", flow_token),
                ("NewUser", "1"),
                ("fspost", "0"),
                ("i13", "0"),
                ("ps", "2"),
                ("i19", "16369"),
            ])
            .send()
            .await?;

        let ctx = FlowContext::navigate(ctx.session, response).await?;

        if let Some(failure) = page::auth_failure(&ctx.body) {
            return Err(failure.into());
        }

        Ok(ctx)
    }

    /// Answer a single "stay signed in?" interrupt with "yes".
    ///
    /// Any further interrupt or a multi-factor challenge is rejected.
    async fn pass_interrupt(&self, ctx: FlowContext) -> Result<FlowContext> {
        Self::reject_challenge(&ctx)?;
        if !page::is_interrupt(&ctx.body) {
            return Ok(ctx);
        }

        let config = PageConfig::extract(&ctx.body)?;
        let url = self.resolve_post_url(&config.post_url)?;
        tracing::debug!(%url, "Confirming stay-signed-in prompt");

        let response = ctx
            .session
            .client()
            .post(url)
            .form(&[
                ("LoginOptions", "1"),
                ("type", "28"),
                ("ctx", config.context()),
                ("flowToken", config.flow_token.as_str()),
                ("canary", config.canary()),
                ("i19", "2048"),
            ])
            .send()
            .await?;

        let ctx = FlowContext::navigate(ctx.session, response).await?;

        Self::reject_challenge(&ctx)?;
        if page::is_interrupt(&ctx.body) {
            return Err(AuthError::ChallengeNotSupported {
                challenge: "repeated sign-in interrupt".to_string(),
            });
        }

        Ok(ctx)
    }

    fn reject_challenge(ctx: &FlowContext) -> Result<()> {
        match page::challenge_marker(&ctx.body) {
            Some(marker) => Err(AuthError::ChallengeNotSupported {
                challenge: marker.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn post_saml_response(ctx: FlowContext) -> Result<FlowContext> {
        let Some(form) = PostForm::extract_with_field(&ctx.body, SAML_RESPONSE_FIELD) else {
            if let Some(other) = PostForm::extract(&ctx.body) {
                tracing::debug!(action = other.action(), "Skipping POST form without a SAML response");
            } else {
                tracing::debug!("No SAML response form, continuing");
            }
            return Ok(ctx);
        };

        let url = ctx.current_url.join(form.action())?;
        tracing::debug!(%url, "Posting SAML response");

        let response = ctx
            .session
            .client()
            .post(url)
            .form(form.fields())
            .send()
            .await?;

        FlowContext::navigate(ctx.session, response).await
    }

    /// Returns the launch redirect's target.
    async fn launch_mobile(&self, ctx: &FlowContext) -> Result<String> {
        let url = self.platform_endpoint("admin/tool/mobile/launch.php")?;
        let passport = rand::thread_rng().gen::<u32>().to_string();
        tracing::debug!(%url, "Requesting mobile launch token");

        let response = ctx
            .session
            .no_redirect_client()
            .post(url.clone())
            .form(&[
                ("service", self.sso.service.as_str()),
                ("passport", passport.as_str()),
                ("urlscheme", self.sso.url_scheme.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !is_redirect(status) {
            return Err(AuthError::UnexpectedResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response
            .headers()
            .get(http::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string())
    }

    /// `relative` under the platform URL, keeping any path prefix it has.
    fn platform_endpoint(&self, relative: &str) -> Result<Url> {
        let mut base = self.sso.platform_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        Ok(base.join(relative)?)
    }

    fn resolve_post_url(&self, post_url: &str) -> Result<Url> {
        if post_url.starts_with("http") {
            Ok(Url::parse(post_url)?)
        } else {
            Ok(self.sso.identity_provider_url.join(post_url)?)
        }
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}
