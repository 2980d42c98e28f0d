//! Dependency injection traits for testability
//!
//! These traits abstract the pieces of the environment the access layer and
//! its commands depend on, so tests can substitute fixed clocks and captured
//! output.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time/clock operations
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock implementation
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// User interface operations
pub trait UserInterface: Send + Sync {
    /// Create a spinner progress indicator
    fn create_spinner(&self) -> Box<dyn ProgressIndicator>;

    /// Create a byte-count progress bar for a transfer of `total` bytes
    fn create_progress_bar(&self, total: u64) -> Box<dyn ProgressIndicator>;

    /// Print a message
    fn print(&self, message: &str);

    /// Print a styled message
    fn print_styled(&self, message: &str, style: MessageStyle);

    /// Check if output goes to a terminal
    fn is_interactive(&self) -> bool;
}

/// Progress indicator trait
pub trait ProgressIndicator: Send + Sync {
    /// Set the message
    fn set_message(&self, message: &str);

    /// Set the current position (progress bars only)
    fn set_position(&self, position: u64);

    /// Set the total length (progress bars only)
    fn set_length(&self, length: u64);

    /// Enable steady tick
    fn enable_steady_tick(&self, duration: Duration);

    /// Finish and clear the progress
    fn finish_and_clear(&self);

    /// Finish with a message
    fn finish_with_message(&self, message: String);
}

/// Message styling options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    /// Bold text style
    Bold,
    /// Cyan colored text
    Cyan,
    /// Blue colored text
    Blue,
    /// Green colored text
    Green,
    /// Yellow colored text
    Yellow,
    /// Red colored text
    Red,
}
