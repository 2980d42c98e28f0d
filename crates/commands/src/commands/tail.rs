//! Follow the instance's log files
//!
//! Picks the newest log per name prefix, prints its last entry, then polls
//! all picked files for appended bytes and prints whole entries as they
//! arrive.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use regex::Regex;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::webdav::{Location, RemoteFile, SfccWebDavClient, WebDavClient};

use crate::ui::RealUserInterface;

/// Log name prefixes followed when none are given
pub const DEFAULT_FILTERS: [&str; 5] = [
    "customerror",
    "customfatal",
    "fatal",
    "error",
    "api-deprecation",
];

/// Time between polls when none is given
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);

/// A log entry starts with a bracketed timestamp such as
/// `[2020-06-01 10:00:00.000 GMT]`
static ENTRY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[\d{4}.+?\w{3}\]").expect("Invalid log entry regex"));

/// Tail command arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct TailArgs {
    /// Log name prefixes; empty means [`DEFAULT_FILTERS`]
    pub filters: Vec<String>,
    /// Delay between polls
    pub interval: Duration,
    /// Follow every matching file instead of the newest per prefix
    pub all: bool,
}

impl Default for TailArgs {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            interval: DEFAULT_INTERVAL,
            all: false,
        }
    }
}

/// Dependencies for the tail command
pub struct TailDependencies {
    /// WebDAV access to the instance logs
    pub webdav: Arc<dyn WebDavClient>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Execute the tail command with injected dependencies.
///
/// Runs until `cancel` is set (or its sender goes away) and returns the
/// process exit code: 0 after cancellation, 1 when there is nothing to
/// follow.
pub async fn execute_with_deps(
    args: &TailArgs,
    deps: &TailDependencies,
    mut cancel: watch::Receiver<bool>,
) -> Result<i32> {
    let filters: Vec<String> = if args.filters.is_empty() {
        DEFAULT_FILTERS.iter().map(ToString::to_string).collect()
    } else {
        args.filters.clone()
    };

    let listing = match deps.webdav.list_directory(Location::Logs, "").await {
        Ok(listing) => listing,
        Err(e) => {
            error!(error = %e, "cannot list logs; check credentials");
            deps.ui
                .print_styled(&format!("Cannot list logs: {e}"), MessageStyle::Red);
            return Ok(1);
        }
    };
    debug!(files = listing.len(), "listed log directory");

    let mut files = select_logs(listing, &filters, args.all);
    if files.is_empty() {
        warn!("no files found to tail");
        deps.ui
            .print_styled("No files found to tail...", MessageStyle::Yellow);
        return Ok(1);
    }
    debug!(files = files.len(), "following log files");

    let fetched = join_all(
        files
            .iter_mut()
            .map(|file| deps.webdav.update_if_changed(file, true)),
    )
    .await;
    for (file, result) in files.iter().zip(fetched) {
        result.with_context(|| format!("Failed to fetch {}", file.filename))?;
        print_entries(deps.ui.as_ref(), file, 0, true);
    }

    loop {
        if *cancel.borrow() {
            return Ok(0);
        }
        tokio::select! {
            () = tokio::time::sleep(args.interval) => {}
            _ = cancel.changed() => return Ok(0),
        }

        let offsets: Vec<usize> = files
            .iter()
            .map(|file| file.contents().map_or(0, <[u8]>::len))
            .collect();
        let updates = join_all(
            files
                .iter_mut()
                .map(|file| deps.webdav.update_if_changed(file, true)),
        )
        .await;

        for ((file, offset), updated) in files.iter().zip(offsets).zip(updates) {
            let updated =
                updated.with_context(|| format!("Failed to update {}", file.filename))?;
            debug!(file = %file.filename, updated, "update status");
            if updated {
                print_entries(deps.ui.as_ref(), file, offset, false);
            }
        }
    }
}

/// Execute the tail command with default dependencies
pub async fn execute(env: &Environment, args: TailArgs, cancel: watch::Receiver<bool>) -> Result<i32> {
    let webdav = SfccWebDavClient::new(env).context("Cannot reach the instance over WebDAV")?;
    let deps = TailDependencies {
        webdav: Arc::new(webdav),
        ui: Arc::new(RealUserInterface),
    };
    execute_with_deps(&args, &deps, cancel).await
}

/// Files whose name starts with each filter, newest first. Only the newest
/// per filter unless `all`. A file matched by several filters is kept once.
pub fn select_logs(listing: Vec<RemoteFile>, filters: &[String], all: bool) -> Vec<RemoteFile> {
    let mut selected: Vec<RemoteFile> = Vec::new();
    for filter in filters {
        let mut matching: Vec<&RemoteFile> = listing
            .iter()
            .filter(|file| file.is_file() && file.filename.starts_with(filter.as_str()))
            .collect();
        matching.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        if !all {
            matching.truncate(1);
        }
        for file in matching {
            if !selected.iter().any(|known| known.uri == file.uri) {
                selected.push(file.clone());
            }
        }
    }
    selected
}

/// Split log text into trimmed, non-blank entries at timestamp lines
pub fn split_entries(text: &str) -> Vec<&str> {
    let mut bounds: Vec<usize> = ENTRY_START.find_iter(text).map(|m| m.start()).collect();
    if bounds.first() != Some(&0) {
        bounds.insert(0, 0);
    }
    bounds.push(text.len());

    bounds
        .windows(2)
        .map(|pair| text[pair[0]..pair[1]].trim())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn print_entries(ui: &dyn UserInterface, file: &RemoteFile, offset: usize, only_last: bool) {
    ui.print_styled(&format!("------- {}", file.filename), MessageStyle::Yellow);

    let text = file.contents_as_string(offset).unwrap_or_default();
    let entries = split_entries(&text);
    let shown = if only_last {
        &entries[entries.len().saturating_sub(1)..]
    } else {
        &entries[..]
    };
    for entry in shown {
        ui.print(entry);
    }

    ui.print_styled("--------------------", MessageStyle::Yellow);
    ui.print("");
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
