//! Credential types persisted per account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long before the recorded expiry an access token stops being trusted.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Access token lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// A stored credential for one account.
///
/// Serialized with an `auth_type` tag so the file reads
/// `{"auth_type": "basic", "password": ...}` or
/// `{"auth_type": "oauth2", "access_token": ..., "refresh_token": ..., "expires_at": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_type", rename_all = "lowercase")]
pub enum Credential {
    /// A plain password for protocols that still accept one.
    Basic {
        /// The account password.
        password: String,
    },
    /// An OAuth2 token set.
    #[serde(rename = "oauth2")]
    OAuth2(TokenSet),
}

impl Credential {
    /// Short name of the credential kind, as stored in `auth_type`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::OAuth2(_) => "oauth2",
        }
    }
}

/// Token set received from the OAuth2 token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token.
    pub access_token: String,
    /// The refresh token (if provided).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires.
    #[serde(with = "epoch_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set whose expiry is `expires_in` seconds after `now`.
    #[must_use]
    pub fn issued_at(
        now: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expiry_after(now, expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
        }
    }

    /// Whether the access token must no longer be used at `now`.
    ///
    /// A token is fresh only while `now < expires_at - margin`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
            .map_or(true, |fresh_until| now >= fresh_until)
    }

    /// Check if the access token is expired or will expire within the margin.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the token can be refreshed.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// `now + secs`, saturating at the latest representable instant.
///
/// Lifetimes come off the wire and may be arbitrarily large.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Unix-seconds serde for expiry timestamps.
///
/// Accepts integer or fractional seconds, writes integer seconds.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom("expiry is not a finite number"));
        }
        #[allow(clippy::cast_possible_truncation)]
        let millis = (secs * 1000.0) as i64;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| serde::de::Error::custom(format!("expiry out of range: {secs}")))
    }
}
