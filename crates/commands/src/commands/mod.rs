//! Command implementations

/// List and activate code versions
pub mod code_versions;
/// Search job executions
pub mod jobs;
/// Compare migration histories
pub mod migrate;
/// Upload local cartridges as a code version
pub mod sync;
/// Follow instance log files
pub mod tail;
/// File operations on the instance WebDAV tree
pub mod webdav;
