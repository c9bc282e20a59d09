//! Headless SAML2 single sign-on.
//!
//! [`SamlBridge`] plays the part of a browser through the identity provider's
//! login pages to obtain the platform's mobile token. Page scraping lives in
//! [`page`] and [`form`]; token decoding in [`mobile_token`].

pub mod bridge;
pub mod context;
pub mod form;
pub mod mobile_token;
pub mod page;

pub use bridge::SamlBridge;
