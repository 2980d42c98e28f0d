//! Resilient access to remote commerce instances
//!
//! This crate holds everything needed to talk to an instance on behalf of the
//! command line tools: the environment descriptor, access tokens and the
//! accessors that mint them, an HTTP client that authenticates every request
//! (renewing and retrying once on rejection), typed OCAPI resources with paged
//! search, an incremental WebDAV sync client and the migration differencer.

/// Token accessors for the two grant flows
pub mod accessor;
/// Authenticating HTTP client
pub mod client;
/// Environment descriptor and constants
pub mod config;
/// Dependency injection traits and implementations
pub mod deps;
/// Error types
pub mod error;
/// Migration chain differencer
pub mod migrations;
/// OCAPI REST resources
pub mod ocapi;
/// Paged search requests and results
pub mod search;
/// Access tokens
pub mod token;
/// WebDAV file access
pub mod webdav;

/// Mocks and fixtures shared by the unit tests
#[cfg(test)]
pub mod test_helpers;

// Re-export commonly used types at the crate root
pub use accessor::{BusinessManagerAccessor, ClientCredentialsAccessor, TokenAccessor};
pub use client::AuthenticatingClient;
pub use config::Environment;
pub use deps::{Clock, MessageStyle, ProgressIndicator, RealClock, UserInterface};
pub use error::{AuthError, ClientError, ClientResult, ConfigError};
pub use migrations::{Migration, MigrationContext, MigrationError};
pub use ocapi::{AgentShopApi, DataApi, ShopApi};
pub use search::{SearchRequest, SearchResults};
pub use token::AccessToken;
pub use webdav::{Location, ProgressObserver, RemoteFile, SfccWebDavClient, WebDavClient};
