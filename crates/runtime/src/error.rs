//! Error types for the access layer
//!
//! Local, recoverable conditions (the one-shot re-authentication, a file
//! that has not changed) never surface as errors. Everything else is
//! returned to the caller as one of the types below.

use std::path::PathBuf;

use reqwest::StatusCode;

use crate::ocapi::types::Fault;

/// Missing or unusable configuration, detected when a component is built
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither an account nor client credentials are configured for a server
    #[error(
        "a valid environment could not be derived; provide a server plus either an account or client credentials"
    )]
    InvalidEnvironment,

    /// Client id or secret missing
    #[error("a valid client id and secret are required")]
    MissingClientCredentials,

    /// Delegated grant without the full account quadruple
    #[error("the Business Manager grant requires an account username, password, client id and secret")]
    MissingBusinessManagerAccount,

    /// Shop API used without a site id
    #[error("a site id is required for the Shop API")]
    MissingSiteId,

    /// Project file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Project file is not valid JSON
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// TLS or proxy setup failed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// A token endpoint refused to issue a token, or could not be reached
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token endpoint answered with a non-success status
    #[error("access token request for client {client_id} was rejected ({status}); check the client id and secret")]
    Rejected {
        /// Client the token was requested for
        client_id: String,
        /// Status returned by the token endpoint
        status: StatusCode,
    },

    /// Token endpoint unreachable
    #[error("access token request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Token payload could not be decoded
    #[error("invalid access token response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
}

/// Failure of a call made through an authenticated client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Token renewal failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Component could not be built
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request could not be sent or its body not read
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote answered with a non-success status
    #[error("remote returned {status}: {body}")]
    Status {
        /// Response status
        status: StatusCode,
        /// Response body, usually an OCAPI fault document
        body: String,
    },

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response was well formed but inconsistent with what was asked
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Response body is not the expected JSON
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// PROPFIND response could not be parsed
    #[error("malformed multistatus response: {0}")]
    Xml(String),

    /// Local file access failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of a non-success response, if that is what failed
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// OCAPI fault document carried by a non-success response
    pub fn fault(&self) -> Option<Fault> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            fault: Fault,
        }

        match self {
            Self::Status { body, .. } => serde_json::from_str::<Envelope>(body)
                .ok()
                .map(|envelope| envelope.fault),
            _ => None,
        }
    }
}

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
