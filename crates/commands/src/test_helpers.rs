//! Test helper utilities and fakes for sfcc-commands
//!
//! `TestUserInterface` captures everything a command prints and the positions
//! its progress bars were moved to. `FakeWebDav` is an in-memory instance file
//! tree with scriptable failures, used in place of the HTTP client.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;

use sfcc_runtime::deps::{MessageStyle, ProgressIndicator, UserInterface};
use sfcc_runtime::error::{ClientError, ClientResult};
use sfcc_runtime::ocapi::types::{CodeVersion, OrganizationPreferences};
use sfcc_runtime::webdav::{Location, ProgressObserver, RemoteFile, WebDavClient};

use crate::commands::code_versions::CodeVersionManager;
use crate::commands::migrate::PreferencesReader;

// Mock implementation of the `CodeVersionManager` trait.
//
// Scripts listing and activation answers for the code version and sync
// commands.
mock! {
    pub CodeVersionManagerMock {}

    #[async_trait]
    impl CodeVersionManager for CodeVersionManagerMock {
        async fn code_versions(&self) -> ClientResult<Vec<CodeVersion>>;
        async fn activate_code_version(&self, id: &str) -> ClientResult<bool>;
    }
}

// Mock implementation of the `PreferencesReader` trait.
mock! {
    pub PreferencesReaderMock {}

    #[async_trait]
    impl PreferencesReader for PreferencesReaderMock {
        async fn global_preferences(
            &self,
            group: &str,
            instance_type: &str,
        ) -> ClientResult<OrganizationPreferences>;
    }
}

/// Test UI implementation that captures output
#[derive(Default)]
pub struct TestUserInterface {
    /// Every printed line, styled or not
    pub output: Arc<Mutex<Vec<String>>>,
    /// Styled lines with their style
    pub styled_output: Arc<Mutex<Vec<(String, MessageStyle)>>>,
    /// Progress positions
    pub progress: Arc<Mutex<Vec<u64>>>,
}

impl TestUserInterface {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Printed lines so far
    pub fn get_output(&self) -> Vec<String> {
        self.output.lock().unwrap().clone()
    }

    /// Styled lines so far
    pub fn get_styled_output(&self) -> Vec<(String, MessageStyle)> {
        self.styled_output.lock().unwrap().clone()
    }

    /// Every position any progress bar was set to, in order
    pub fn get_progress(&self) -> Vec<u64> {
        self.progress.lock().unwrap().clone()
    }

    /// Whether any printed line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.get_output().iter().any(|line| line.contains(needle))
    }
}

impl UserInterface for TestUserInterface {
    fn create_spinner(&self) -> Box<dyn ProgressIndicator> {
        Box::new(TestProgressIndicator {
            output: self.output.clone(),
            positions: self.progress.clone(),
        })
    }

    fn create_progress_bar(&self, _total: u64) -> Box<dyn ProgressIndicator> {
        Box::new(TestProgressIndicator {
            output: self.output.clone(),
            positions: self.progress.clone(),
        })
    }

    fn print(&self, message: &str) {
        self.output.lock().unwrap().push(message.to_string());
    }

    fn print_styled(&self, message: &str, style: MessageStyle) {
        self.styled_output
            .lock()
            .unwrap()
            .push((message.to_string(), style));
        self.output.lock().unwrap().push(message.to_string());
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

struct TestProgressIndicator {
    output: Arc<Mutex<Vec<String>>>,
    positions: Arc<Mutex<Vec<u64>>>,
}

impl ProgressIndicator for TestProgressIndicator {
    fn set_message(&self, _message: &str) {}

    fn set_position(&self, position: u64) {
        self.positions.lock().unwrap().push(position);
    }

    fn set_length(&self, _length: u64) {}

    fn enable_steady_tick(&self, _duration: Duration) {}

    fn finish_and_clear(&self) {}

    fn finish_with_message(&self, message: String) {
        self.output.lock().unwrap().push(message);
    }
}

/// In-memory stand-in for an instance's WebDAV tree.
///
/// Entries are keyed by their full WebDAV path. Operation names used with
/// `failing` and `refusing` are `list`, `info`, `get`, `put`, `download`,
/// `delete`, `mkdir`, `unzip` and `update`.
#[derive(Default)]
pub struct FakeWebDav {
    entries: Mutex<BTreeMap<String, (RemoteFile, Vec<u8>)>>,
    failing: HashSet<&'static str>,
    refusing: HashSet<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeWebDav {
    /// Create an empty instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file at `path`
    pub fn with_file(self, location: Location, path: &str, contents: &[u8], modified: DateTime<Utc>) -> Self {
        let uri = location.path(path);
        let mut file = RemoteFile::new(uri.clone(), file_name(path));
        file.length = contents.len() as u64;
        file.last_modified = Some(modified);
        self.entries
            .lock()
            .unwrap()
            .insert(uri, (file, contents.to_vec()));
        self
    }

    /// Store a directory at `path`
    pub fn with_directory(self, location: Location, path: &str, modified: DateTime<Utc>) -> Self {
        let uri = location.path(path);
        let mut dir = RemoteFile::new(uri.clone(), file_name(path));
        dir.is_directory = true;
        dir.last_modified = Some(modified);
        self.entries.lock().unwrap().insert(uri, (dir, Vec::new()));
        self
    }

    /// Make `operation` fail with an I/O error
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Make `operation` answer "not done" without failing
    pub fn refusing(mut self, operation: &'static str) -> Self {
        self.refusing.insert(operation);
        self
    }

    /// Grow a stored file, as a log being written to would
    pub fn append(&self, location: Location, path: &str, bytes: &[u8]) {
        let mut entries = self.entries.lock().unwrap();
        let (file, contents) = entries
            .get_mut(&location.path(path))
            .expect("appending to a file the fake does not hold");
        contents.extend_from_slice(bytes);
        file.length = contents.len() as u64;
    }

    /// Stored body of `path`
    pub fn contents(&self, location: Location, path: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(&location.path(path))
            .map(|(_, contents)| contents.clone())
    }

    /// Whether anything is stored at `path`
    pub fn exists(&self, location: Location, path: &str) -> bool {
        self.entries.lock().unwrap().contains_key(&location.path(path))
    }

    /// Operations performed so far, as `"<operation> <uri>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, uri: &str) -> ClientResult<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation} {uri}"));
        if self.failing.contains(operation) {
            return Err(ClientError::Io(io::Error::other(format!("{operation} failed"))));
        }
        Ok(!self.refusing.contains(operation))
    }

    fn lookup(&self, uri: &str) -> Option<(RemoteFile, Vec<u8>)> {
        self.entries.lock().unwrap().get(uri).cloned()
    }
}

fn file_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl WebDavClient for FakeWebDav {
    async fn list_directory(&self, location: Location, directory: &str) -> ClientResult<Vec<RemoteFile>> {
        let mut prefix = location.path(directory);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.record("list", &prefix)?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter_map(|(uri, (file, _))| {
                let rest = uri.strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| file.clone())
            })
            .collect())
    }

    async fn get_info(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>> {
        let uri = location.path(path);
        if !self.record("info", &uri)? {
            return Ok(None);
        }
        Ok(self.lookup(&uri).map(|(file, _)| file))
    }

    async fn get(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>> {
        let uri = location.path(path);
        if !self.record("get", &uri)? {
            return Ok(None);
        }
        Ok(self
            .lookup(&uri)
            .map(|(file, contents)| file.with_contents(contents)))
    }

    async fn put(&self, location: Location, path: &str, contents: Vec<u8>) -> ClientResult<bool> {
        let uri = location.path(path);
        if !self.record("put", &uri)? {
            return Ok(false);
        }
        let mut file = RemoteFile::new(uri.clone(), file_name(path));
        file.length = contents.len() as u64;
        file.last_modified = Some(Utc::now());
        self.entries.lock().unwrap().insert(uri, (file, contents));
        Ok(true)
    }

    async fn put_file(
        &self,
        location: Location,
        path: &str,
        local: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> ClientResult<bool> {
        let contents = tokio::fs::read(local).await?;
        let total = contents.len() as u64;
        progress.report(0, total);
        let stored = self.put(location, path, contents).await?;
        if stored {
            progress.report(total, total);
        }
        Ok(stored)
    }

    async fn download(&self, location: Location, path: &str, destination: &Path) -> ClientResult<u64> {
        let uri = location.path(path);
        self.record("download", &uri)?;
        let (_, contents) = self
            .lookup(&uri)
            .ok_or_else(|| ClientError::Io(io::Error::new(io::ErrorKind::NotFound, uri.clone())))?;
        tokio::fs::write(destination, &contents).await?;
        Ok(contents.len() as u64)
    }

    async fn delete(&self, location: Location, path: &str) -> ClientResult<bool> {
        let uri = location.path(path);
        if !self.record("delete", &uri)? {
            return Ok(false);
        }
        let nested = format!("{}/", uri.trim_end_matches('/'));
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| *key != uri && !key.starts_with(&nested));
        Ok(entries.len() < before)
    }

    async fn make_directory(&self, location: Location, path: &str) -> ClientResult<bool> {
        let uri = location.path(path);
        if !self.record("mkdir", &uri)? {
            return Ok(false);
        }
        let mut dir = RemoteFile::new(uri.clone(), file_name(path));
        dir.is_directory = true;
        self.entries
            .lock()
            .unwrap()
            .entry(uri)
            .or_insert((dir, Vec::new()));
        Ok(true)
    }

    async fn decompress_remote_archive(&self, location: Location, path: &str) -> ClientResult<bool> {
        self.record("unzip", &location.path(path))
    }

    async fn update_if_changed(&self, file: &mut RemoteFile, _use_range: bool) -> ClientResult<bool> {
        self.record("update", &file.uri)?;
        if file.is_directory {
            return Ok(false);
        }
        let Some((_, stored)) = self.lookup(&file.uri) else {
            return Ok(false);
        };
        let Some(known) = file.contents().map(<[u8]>::len) else {
            *file = std::mem::take(file).with_contents(stored);
            return Ok(true);
        };
        match stored.get(known..) {
            Some(added) if !added.is_empty() => {
                file.append(added);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
