//! Per-run browser session and the page state threaded between steps.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use url::Url;

use crate::config::HttpConfig;
use crate::error::Result;

/// Cookie jar plus the two clients that share it.
///
/// `follow` behaves like a browser navigating; `no_follow` is for the one
/// request whose redirect target must be inspected rather than visited.
/// A session lives for exactly one bridge run.
pub struct SsoSession {
    follow: Client,
    no_follow: Client,
}

impl SsoSession {
    /// Start a fresh session with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let build = |policy: Policy| {
            Client::builder()
                .user_agent(http.user_agent.as_str())
                .timeout(Duration::from_secs(http.timeout_secs))
                .cookie_provider(Arc::clone(&jar))
                .redirect(policy)
                .build()
        };

        Ok(Self {
            follow: build(Policy::limited(10))?,
            no_follow: build(Policy::none())?,
        })
    }

    /// Client that follows redirects.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.follow
    }

    /// Client that returns redirects unfollowed.
    #[must_use]
    pub const fn no_redirect_client(&self) -> &Client {
        &self.no_follow
    }
}

/// Where the scripted browser currently is.
///
/// Each step consumes the context and returns the next one; the session moves
/// along with it.
pub struct FlowContext {
    /// Cookie-carrying session.
    pub session: SsoSession,
    /// URL of the current page after redirects.
    pub current_url: Url,
    /// Body of the current page.
    pub body: String,
}

impl FlowContext {
    /// Context for the page `response` navigated to.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be read.
    pub async fn navigate(session: SsoSession, response: Response) -> Result<Self> {
        let current_url = response.url().clone();
        let body = response.text().await?;
        tracing::debug!(url = %current_url, bytes = body.len(), "Loaded page");
        Ok(Self {
            session,
            current_url,
            body,
        })
    }

    /// Whether the current page is served by the same host as `expected`.
    #[must_use]
    pub fn is_on(&self, expected: &Url) -> bool {
        same_host(&self.current_url, expected)
    }
}

/// Host and effective port equality.
#[must_use]
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str()
        .zip(b.host_str())
        .is_some_and(|(x, y)| x.eq_ignore_ascii_case(y))
        && a.port_or_known_default() == b.port_or_known_default()
}
