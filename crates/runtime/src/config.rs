//! Centralized configuration for the remote instance access layer
//!
//! This module provides the endpoint constants used by the token accessors,
//! the OCAPI clients and the WebDAV client, together with the [`Environment`]
//! descriptor that names a single remote instance and the credentials used to
//! reach it.
//!
//! # Environment Variables
//!
//! [`Environment::from_env`] reads:
//! - `SFCC_SERVER`: Instance hostname (or a full `http(s)://` base URL)
//! - `SFCC_USERNAME` / `SFCC_PASSWORD`: Business Manager account
//! - `SFCC_CLIENT_ID` / `SFCC_CLIENT_SECRET`: API client credentials
//! - `SFCC_CODE_VERSION`: Code version targeted by deployments
//! - `SFCC_SITE_ID`: Site used by the Shop API

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Base URL of the account manager (service-to-service grant authority)
pub const ACCOUNT_MANAGER_URL: &str = "https://account.demandware.com/";

/// Token path on the account manager, relative to [`ACCOUNT_MANAGER_URL`]
pub const ACCOUNT_MANAGER_TOKEN_PATH: &str = "dwsso/oauth2/access_token";

/// Token path on an instance for the Business Manager grant
pub const BUSINESS_MANAGER_TOKEN_PATH: &str = "/dw/oauth2/access_token";

/// Grant type of the service-to-service flow
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Grant type of the delegated Business Manager flow
pub const BUSINESS_MANAGER_GRANT: &str =
    "urn:demandware:params:oauth:grant-type:client-id:dwsid:dwsecuretoken";

/// Header carrying the API client id on authenticated calls
pub const CLIENT_ID_HEADER: &str = "x-dw-client-id";

/// OCAPI version used by the Data API and the Shop API
pub const OCAPI_VERSION: &str = "v20_8";

/// OCAPI version used by the agent (Business Manager grant) Shop API
pub const OCAPI_AGENT_VERSION: &str = "v20_2";

/// Root of the WebDAV servlet on an instance
pub const WEBDAV_ROOT: &str = "/on/demandware.servlet/webdav/Sites";

/// User agent sent with every request
pub const USER_AGENT: &str = "SFCC-Tools";

/// Default API timeout in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default chunk size for streamed uploads (500 KiB)
pub const DEFAULT_UPLOAD_BUFFER_SIZE: usize = 1024 * 500;

/// Environment variable holding the instance hostname
pub const SERVER_ENV_VAR: &str = "SFCC_SERVER";
/// Environment variable holding the Business Manager username
pub const USERNAME_ENV_VAR: &str = "SFCC_USERNAME";
/// Environment variable holding the Business Manager password
pub const PASSWORD_ENV_VAR: &str = "SFCC_PASSWORD";
/// Environment variable holding the API client id
pub const CLIENT_ID_ENV_VAR: &str = "SFCC_CLIENT_ID";
/// Environment variable holding the API client secret
pub const CLIENT_SECRET_ENV_VAR: &str = "SFCC_CLIENT_SECRET";
/// Environment variable holding the code version
pub const CODE_VERSION_ENV_VAR: &str = "SFCC_CODE_VERSION";
/// Environment variable holding the site id
pub const SITE_ID_ENV_VAR: &str = "SFCC_SITE_ID";

/// A single remote instance and the credential material used to reach it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Instance hostname, or a full base URL including the scheme
    pub server: String,
    /// Business Manager account name
    pub username: Option<String>,
    /// Business Manager account password
    pub password: Option<String>,
    /// API client id
    pub client_id: Option<String>,
    /// API client secret
    pub client_secret: Option<String>,
    /// Code version targeted by deployments
    pub code_version: Option<String>,
    /// Site used by the Shop API
    pub site_id: Option<String>,
    /// Verify TLS certificates
    pub verify: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: None,
            password: None,
            client_id: None,
            client_secret: None,
            code_version: None,
            site_id: None,
            verify: true,
        }
    }
}

// Secrets never reach logs.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("code_version", &self.code_version)
            .field("site_id", &self.site_id)
            .field("verify", &self.verify)
            .finish()
    }
}

/// Layout of the conventional `dw.json` project file
#[derive(Debug, Deserialize)]
struct DwJson {
    hostname: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(rename = "client-id")]
    client_id: Option<String>,
    #[serde(rename = "client-secret")]
    client_secret: Option<String>,
    #[serde(rename = "code-version")]
    code_version: Option<String>,
    #[serde(rename = "site-id")]
    site_id: Option<String>,
}

fn present(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

impl Environment {
    /// Create an environment for the given server with no credentials
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Set the Business Manager account
    #[must_use]
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the API client credentials
    #[must_use]
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the site used by the Shop API
    #[must_use]
    pub fn with_site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Build an environment from `SFCC_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build an environment from `SFCC_*` variables resolved by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            server: var(SERVER_ENV_VAR).unwrap_or_default(),
            username: var(USERNAME_ENV_VAR),
            password: var(PASSWORD_ENV_VAR),
            client_id: var(CLIENT_ID_ENV_VAR),
            client_secret: var(CLIENT_SECRET_ENV_VAR),
            code_version: var(CODE_VERSION_ENV_VAR),
            site_id: var(SITE_ID_ENV_VAR),
            verify: true,
        }
    }

    /// Load an environment from a `dw.json` project file
    pub fn from_dw_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let dw: DwJson = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            server: dw.hostname.unwrap_or_default(),
            username: dw.username,
            password: dw.password,
            client_id: dw.client_id,
            client_secret: dw.client_secret,
            code_version: dw.code_version,
            site_id: dw.site_id,
            verify: true,
        })
    }

    /// Fill every unset field from `other`
    #[must_use]
    pub fn merged_with(mut self, other: Self) -> Self {
        if self.server.is_empty() {
            self.server = other.server;
        }
        self.username = self.username.or(other.username);
        self.password = self.password.or(other.password);
        self.client_id = self.client_id.or(other.client_id);
        self.client_secret = self.client_secret.or(other.client_secret);
        self.code_version = self.code_version.or(other.code_version);
        self.site_id = self.site_id.or(other.site_id);
        self
    }

    /// Whether there is enough information to attempt a logon.
    ///
    /// Requires a server plus either a Business Manager account or a client
    /// id/secret pair. Values are not checked against the instance.
    pub fn is_valid(&self) -> bool {
        !self.server.is_empty() && (self.has_account() || self.has_client_credentials())
    }

    /// Whether a client id and secret are both present
    pub fn has_client_credentials(&self) -> bool {
        present(self.client_id.as_ref()) && present(self.client_secret.as_ref())
    }

    /// Whether a Business Manager username and password are both present
    pub fn has_account(&self) -> bool {
        present(self.username.as_ref()) && present(self.password.as_ref())
    }

    /// Fail unless [`Environment::is_valid`] holds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::InvalidEnvironment)
        }
    }

    /// Fail unless a client id/secret pair is present
    pub fn require_client_credentials(&self) -> Result<(), ConfigError> {
        if self.has_client_credentials() {
            Ok(())
        } else {
            Err(ConfigError::MissingClientCredentials)
        }
    }

    /// Site id, required by the Shop API
    pub fn require_site_id(&self) -> Result<&str, ConfigError> {
        self.site_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSiteId)
    }

    /// Base URL of the instance; bare hostnames are reached over https
    pub fn base_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("https://{server}")
        }
    }

    /// Build the HTTP client used for every call against this environment
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_API_TIMEOUT_SECS))
            .danger_accept_invalid_certs(!self.verify)
            .build()
            .map_err(ConfigError::HttpClient)
    }
}
