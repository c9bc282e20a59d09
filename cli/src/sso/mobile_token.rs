//! Decoding of the platform's mobile launch token.
//!
//! The launch redirect carries base64 of `passport:::token[:::privateToken]`,
//! usually with its `=` padding stripped.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{AuthError, Result};

/// Separator between the launch token's parts.
pub const TOKEN_DELIMITER: &str = ":::";

/// Longest prefix of a bad value echoed back in errors.
const FRAGMENT_LEN: usize = 50;

/// The parts of a decoded launch token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMobileToken {
    /// Site/passport signature.
    pub passport: String,
    /// Web service token.
    pub token: String,
    /// Private token, when the site issues one.
    pub private_token: Option<String>,
}

impl DecodedMobileToken {
    /// Decode the raw `token=` value of a launch redirect.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedToken`] if the value is not base64 or
    /// does not hold at least two parts.
    pub fn decode(raw: &str) -> Result<Self> {
        let normalized: String = restore_padding(raw)
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                c => c,
            })
            .collect();

        let bytes = BASE64
            .decode(normalized.as_bytes())
            .map_err(|_| AuthError::MalformedToken {
                fragment: fragment(raw),
            })?;

        Self::parse(&String::from_utf8_lossy(&bytes))
    }

    /// Split an already decoded `passport:::token[:::privateToken]` value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedToken`] if there is no delimiter.
    pub fn parse(decoded: &str) -> Result<Self> {
        let mut parts = decoded.split(TOKEN_DELIMITER);
        let passport = parts.next().unwrap_or_default();
        let Some(token) = parts.next() else {
            return Err(AuthError::MalformedToken {
                fragment: fragment(decoded),
            });
        };

        Ok(Self {
            passport: passport.to_string(),
            token: token.to_string(),
            private_token: parts.next().map(String::from),
        })
    }
}

/// Append `=` until the length is a multiple of four.
#[must_use]
pub fn restore_padding(raw: &str) -> String {
    let missing = (4 - raw.len() % 4) % 4;
    let mut padded = String::with_capacity(raw.len() + missing);
    padded.push_str(raw);
    padded.extend(std::iter::repeat('=').take(missing));
    padded
}

fn fragment(value: &str) -> String {
    value.chars().take(FRAGMENT_LEN).collect()
}
