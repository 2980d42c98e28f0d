//! Incremental file sync over the instance WebDAV surface
//!
//! Remote paths are `WEBDAV_ROOT/<location>/<relative path>`, where the
//! location is one of the fixed [`Location`]s the instance exposes.
//! [`WebDavClient`] is the seam commands depend on; [`SfccWebDavClient`] is
//! the implementation talking to a real instance.

mod client;
mod file;
mod multistatus;
mod progress;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

pub use client::SfccWebDavClient;
pub use file::RemoteFile;
pub use progress::ProgressObserver;

use crate::config::WEBDAV_ROOT;
use crate::error::ClientResult;

/// Top level WebDAV directories of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Import and export archives
    Impex,
    /// Application logs
    Logs,
    /// Code versions
    Cartridges,
    /// Security logs
    Securitylogs,
    /// Scratch space
    Temp,
    /// Realm data
    Realmdata,
}

impl Location {
    /// Every location
    pub const ALL: [Self; 6] = [
        Self::Impex,
        Self::Logs,
        Self::Cartridges,
        Self::Securitylogs,
        Self::Temp,
        Self::Realmdata,
    ];

    /// Directory name of the location
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Impex => "Impex",
            Self::Logs => "Logs",
            Self::Cartridges => "Cartridges",
            Self::Securitylogs => "Securitylogs",
            Self::Temp => "Temp",
            Self::Realmdata => "Realmdata",
        }
    }

    /// Server-relative path of `path` under this location
    pub fn path(self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{WEBDAV_ROOT}/{self}/")
        } else {
            format!("{WEBDAV_ROOT}/{self}/{path}")
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name that matches no [`Location`]
#[derive(Debug, thiserror::Error)]
#[error("unknown WebDAV location '{0}'")]
pub struct UnknownLocation(pub String);

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|location| location.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}

/// File operations against one instance.
///
/// Operations that only report acceptance return `Ok(false)` when the
/// instance refuses; errors are reserved for failures to reach it.
#[async_trait]
pub trait WebDavClient: Send + Sync {
    /// Entries of `directory`, excluding the directory itself
    async fn list_directory(&self, location: Location, directory: &str) -> ClientResult<Vec<RemoteFile>>;

    /// Metadata of `path`, or None if the instance does not have it
    async fn get_info(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>>;

    /// Metadata and body of `path`
    async fn get(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>>;

    /// Upload `contents` to `path`, replacing any existing file
    async fn put(&self, location: Location, path: &str, contents: Vec<u8>) -> ClientResult<bool>;

    /// Upload a local file, reporting progress as it is sent
    async fn put_file(
        &self,
        location: Location,
        path: &str,
        local: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> ClientResult<bool>;

    /// Save `path` to `destination` without holding it in memory, returning
    /// the number of bytes written
    async fn download(&self, location: Location, path: &str, destination: &Path) -> ClientResult<u64>;

    /// Delete `path`, recursively for directories
    async fn delete(&self, location: Location, path: &str) -> ClientResult<bool>;

    /// Create `path`; succeeds without a request if it already exists
    async fn make_directory(&self, location: Location, path: &str) -> ClientResult<bool>;

    /// Ask the instance to unpack an archive it already holds
    async fn decompress_remote_archive(&self, location: Location, path: &str) -> ClientResult<bool>;

    /// Bring `file` up to date, appending bytes added since it was fetched.
    ///
    /// Returns whether new content arrived. "Not modified" and "range not
    /// satisfiable" answers are not errors.
    async fn update_if_changed(&self, file: &mut RemoteFile, use_range: bool) -> ClientResult<bool>;
}
