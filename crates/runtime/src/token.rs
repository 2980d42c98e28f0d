//! Bearer access tokens
//!
//! An [`AccessToken`] is immutable once issued. Renewal mints a new token;
//! nothing ever extends or rewrites an existing one.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Authorization scheme of every token issued by the platform
pub const TOKEN_SCHEME: &str = "Bearer";

/// Token payload returned by both token endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer value
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// A bearer credential with an expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    owner_id: String,
    issued_at: DateTime<Utc>,
    ttl_seconds: u64,
}

impl AccessToken {
    /// Create a token issued to `owner_id` at `issued_at`
    pub fn new(
        value: impl Into<String>,
        owner_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            value: value.into(),
            owner_id: owner_id.into(),
            issued_at,
            ttl_seconds,
        }
    }

    /// Stamp a token endpoint response with its owning client id
    pub fn from_response(
        response: TokenResponse,
        owner_id: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self::new(response.access_token, owner_id, issued_at, response.expires_in)
    }

    /// The bearer value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Always [`TOKEN_SCHEME`]
    pub const fn scheme(&self) -> &'static str {
        TOKEN_SCHEME
    }

    /// Client id the token was issued to
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Moment the token was received
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Lifetime granted by the token endpoint
    pub const fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// `issued_at + ttl_seconds`, saturating at the end of representable time
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| self.issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the token is expired at `now`.
    ///
    /// The boundary is inclusive: a token expiring exactly at `now` is
    /// already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whether the token is expired according to the system clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Value of the `Authorization` header for this token
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.scheme(), self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field("issued_at", &self.issued_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
