//! Test helper utilities and mock implementations for the access layer.
//!
//! # Example
//!
//! ```ignore
//! use sfcc_runtime::test_helpers::*;
//!
//! let mut accessor = MockTokenAccessorMock::new();
//! accessor.expect_is_valid().return_const(false);
//! accessor
//!     .expect_renew()
//!     .times(1)
//!     .returning(|| Ok(test_token("fresh")));
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mockall::mock;

use crate::accessor::TokenAccessor;
use crate::config::Environment;
use crate::deps::Clock;
use crate::error::AuthError;
use crate::token::AccessToken;

// Mock implementation of the `TokenAccessor` trait for testing.
//
// Lets middleware tests script validity checks and renewals without a token
// endpoint.
mock! {
    pub TokenAccessorMock {}

    #[async_trait]
    impl TokenAccessor for TokenAccessorMock {
        fn current_token(&self) -> Option<AccessToken>;
        fn is_valid(&self) -> bool;
        async fn renew(&self) -> Result<AccessToken, AuthError>;
    }
}

/// Clock frozen at a settable instant
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2020, 1, 12, 20, 10, 37).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Environment with client credentials `test-client` / `test-secret`
pub fn test_environment(server: &str) -> Environment {
    Environment::new(server).with_client_credentials("test-client", "test-secret")
}

/// A token for `test-client`, valid for thirty minutes from now
pub fn test_token(value: &str) -> AccessToken {
    AccessToken::new(value, "test-client", Utc::now(), 1800)
}

/// Accessor that always holds a valid token with the given value and never
/// expects a renewal unless the test adds one
pub fn accessor_holding(token: &'static str) -> MockTokenAccessorMock {
    let mut accessor = MockTokenAccessorMock::new();
    accessor.expect_is_valid().return_const(true);
    accessor
        .expect_current_token()
        .returning(move || Some(test_token(token)));
    accessor
}
