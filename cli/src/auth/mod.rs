//! Authentication module for campus-auth.
//!
//! This module provides the OAuth2 device-code login, refresh-token renewal
//! and the account-keyed credential file they persist into.

pub mod credentials;
pub mod device_flow;
pub mod endpoint;
pub mod refresh;
pub mod tokens;

pub use credentials::CredentialStore;
pub use device_flow::{open_browser, poll_for_token, start_device_flow};
pub use endpoint::HttpTokenEndpoint;
pub use refresh::TokenRefresher;
pub use tokens::Credential;
