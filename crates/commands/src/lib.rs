//! Command implementations for the SFCC command line tools
//!
//! Every command takes its collaborators through a `*Dependencies` struct so
//! it can be exercised against fakes; `execute` wires up the real ones.

/// Command implementations module
pub mod commands;

/// Terminal user interface
pub mod ui;

/// Fakes and mocks shared by the command tests
#[cfg(test)]
pub mod test_helpers;

pub use commands::{code_versions, jobs, migrate, sync, tail, webdav};
pub use ui::RealUserInterface;
