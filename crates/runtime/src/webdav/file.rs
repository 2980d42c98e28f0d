use chrono::{DateTime, Utc};

/// A file or directory on the instance, as last seen.
///
/// `contents` stays empty until fetched. After that it only ever grows, and
/// directories never hold any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFile {
    /// Server-relative path (or absolute URL) of the entry
    pub uri: String,
    /// Last path segment
    pub filename: String,
    /// Whether the entry is a collection
    pub is_directory: bool,
    /// Size in bytes; the size of `contents` once fetched
    pub length: u64,
    /// Entity tag of the version last seen
    pub etag: Option<String>,
    /// MIME type reported by the instance
    pub content_type: Option<String>,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
    /// Creation time
    pub creation_date: Option<DateTime<Utc>>,
    contents: Option<Vec<u8>>,
}

impl RemoteFile {
    /// Entry at `uri` named `filename`, with no metadata or body yet
    pub fn new(uri: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Set the initial body of a file. Ignored for directories.
    #[must_use]
    pub fn with_contents(mut self, contents: Vec<u8>) -> Self {
        self.fill(contents);
        self
    }

    /// Whether the entry is a plain file
    pub const fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Whether the body has been fetched
    pub const fn has_contents(&self) -> bool {
        self.contents.is_some()
    }

    /// Fetched body
    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    /// Body from byte `offset` on, decoded as UTF-8 with replacement of
    /// invalid sequences
    pub fn contents_as_string(&self, offset: usize) -> Option<String> {
        let contents = self.contents.as_deref()?;
        let tail = contents.get(offset..).unwrap_or_default();
        Some(String::from_utf8_lossy(tail).into_owned())
    }

    /// Append bytes to an already fetched body, returning the new length.
    ///
    /// A file without a body starts one; directories are left alone.
    pub fn append(&mut self, bytes: &[u8]) -> u64 {
        if self.is_directory {
            return self.length;
        }
        let contents = self.contents.get_or_insert_with(Vec::new);
        contents.extend_from_slice(bytes);
        self.length = contents.len() as u64;
        self.length
    }

    pub(crate) fn fill(&mut self, contents: Vec<u8>) {
        if self.is_directory {
            return;
        }
        self.length = contents.len() as u64;
        self.contents = Some(contents);
    }
}
