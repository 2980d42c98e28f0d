//! Token accessors
//!
//! A [`TokenAccessor`] holds at most one current [`AccessToken`] and knows how
//! to mint a new one. Two interchangeable strategies are provided:
//!
//! - [`ClientCredentialsAccessor`]: service-to-service grant against the
//!   account manager, using the API client id and secret.
//! - [`BusinessManagerAccessor`]: delegated grant against a specific
//!   instance, authenticated as a Business Manager account.
//!
//! Both validate their credentials when built and never log secrets.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Response;
use tracing::{debug, error};

use crate::config::{
    ACCOUNT_MANAGER_TOKEN_PATH, ACCOUNT_MANAGER_URL, BUSINESS_MANAGER_GRANT,
    BUSINESS_MANAGER_TOKEN_PATH, CLIENT_CREDENTIALS_GRANT, Environment,
};
use crate::deps::{Clock, RealClock};
use crate::error::{AuthError, ConfigError};
use crate::token::{AccessToken, TokenResponse};

/// Capability shared by every token acquisition strategy
#[async_trait]
pub trait TokenAccessor: Send + Sync {
    /// The token currently held, if any
    fn current_token(&self) -> Option<AccessToken>;

    /// Whether a token is held and has not expired
    fn is_valid(&self) -> bool;

    /// Request a new token, replacing the one held on success
    async fn renew(&self) -> Result<AccessToken, AuthError>;
}

/// The single token slot of an accessor.
///
/// Concurrent renewals are not serialized; the last one to finish wins.
struct TokenSlot {
    token: RwLock<Option<AccessToken>>,
    clock: Arc<dyn Clock>,
}

impl TokenSlot {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            token: RwLock::new(None),
            clock,
        }
    }

    fn current(&self) -> Option<AccessToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_valid(&self) -> bool {
        let now = self.clock.now();
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_expired_at(now))
    }

    fn replace(&self, token: AccessToken) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Turn a token endpoint response into the new current token
    async fn accept(&self, response: Response, client_id: &str) -> Result<AccessToken, AuthError> {
        let status = response.status();
        if !status.is_success() {
            error!(%status, client_id, "access token request rejected");
            return Err(AuthError::Rejected {
                client_id: client_id.to_string(),
                status,
            });
        }

        let payload: TokenResponse = response.json().await.map_err(AuthError::InvalidResponse)?;
        let token = AccessToken::from_response(payload, client_id, self.clock.now());
        debug!(client_id, expires_at = %token.expires_at(), "obtained access token");

        self.replace(token.clone());
        Ok(token)
    }
}

/// Obtains tokens through the service-to-service (client credentials) grant
pub struct ClientCredentialsAccessor {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    slot: TokenSlot,
}

impl ClientCredentialsAccessor {
    /// Create an accessor for the environment's API client.
    ///
    /// Fails if the environment is incomplete or lacks a client id/secret.
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        env.validate()?;
        env.require_client_credentials()?;
        let (Some(client_id), Some(client_secret)) = (&env.client_id, &env.client_secret) else {
            return Err(ConfigError::MissingClientCredentials);
        };

        Ok(Self {
            http: env.http_client()?,
            token_url: format!("{ACCOUNT_MANAGER_URL}{ACCOUNT_MANAGER_TOKEN_PATH}"),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            slot: TokenSlot::new(Arc::new(RealClock)),
        })
    }

    /// Use a different account manager base URL (must end with `/`)
    #[must_use]
    pub fn with_account_manager_url(mut self, base_url: &str) -> Self {
        self.token_url = format!("{base_url}{ACCOUNT_MANAGER_TOKEN_PATH}");
        self
    }

    /// Use a different clock for expiry checks and issue stamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.slot = TokenSlot::new(clock);
        self
    }

    /// Client id the tokens are issued to
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl TokenAccessor for ClientCredentialsAccessor {
    fn current_token(&self) -> Option<AccessToken> {
        self.slot.current()
    }

    fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }

    async fn renew(&self) -> Result<AccessToken, AuthError> {
        debug!(client_id = %self.client_id, "sending access token request");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", CLIENT_CREDENTIALS_GRANT)])
            .send()
            .await
            .map_err(AuthError::Transport)?;

        self.slot.accept(response, &self.client_id).await
    }
}

/// Obtains tokens through the delegated Business Manager grant.
///
/// Tokens are scoped to the environment's instance and act as the
/// configured Business Manager account.
pub struct BusinessManagerAccessor {
    http: reqwest::Client,
    token_url: String,
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
    slot: TokenSlot,
}

impl BusinessManagerAccessor {
    /// Create an accessor for the environment's account and API client.
    ///
    /// Fails unless username, password, client id and secret are all set.
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        env.validate()?;
        if !env.has_account() || !env.has_client_credentials() {
            return Err(ConfigError::MissingBusinessManagerAccount);
        }
        let (Some(username), Some(password), Some(client_id), Some(client_secret)) = (
            &env.username,
            &env.password,
            &env.client_id,
            &env.client_secret,
        ) else {
            return Err(ConfigError::MissingBusinessManagerAccount);
        };

        Ok(Self {
            http: env.http_client()?,
            token_url: format!("{}{BUSINESS_MANAGER_TOKEN_PATH}", env.base_url()),
            username: username.clone(),
            password: password.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            slot: TokenSlot::new(Arc::new(RealClock)),
        })
    }

    /// Use a different clock for expiry checks and issue stamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.slot = TokenSlot::new(clock);
        self
    }

    /// Client id the tokens are issued to
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl TokenAccessor for BusinessManagerAccessor {
    fn current_token(&self) -> Option<AccessToken> {
        self.slot.current()
    }

    fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }

    async fn renew(&self) -> Result<AccessToken, AuthError> {
        debug!(client_id = %self.client_id, username = %self.username, "sending business manager grant request");
        // The grant expects `username:password:client_secret` as Basic credentials.
        let secret = format!("{}:{}", self.password, self.client_secret);
        let response = self
            .http
            .post(&self.token_url)
            .query(&[("client_id", self.client_id.as_str())])
            .basic_auth(&self.username, Some(secret))
            .form(&[("grant_type", BUSINESS_MANAGER_GRANT)])
            .send()
            .await
            .map_err(AuthError::Transport)?;

        self.slot.accept(response, &self.client_id).await
    }
}

#[cfg(test)]
#[path = "accessor_tests.rs"]
mod tests;
