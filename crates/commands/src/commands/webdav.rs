//! File operations on the instance's WebDAV tree

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, info};

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, ProgressIndicator, UserInterface};
use sfcc_runtime::webdav::{Location, ProgressObserver, RemoteFile, SfccWebDavClient, WebDavClient};

use crate::ui::RealUserInterface;

/// One WebDAV operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebDavAction {
    /// List a directory
    Ls {
        /// Remote directory
        directory: String,
        /// Regular expression entry names must match
        filter: Option<String>,
        /// Newest first instead of by name
        sort_by_time: bool,
    },
    /// Download a file
    Get {
        /// Remote file
        path: String,
        /// Local file to write; defaults to the remote file name
        destination: Option<PathBuf>,
    },
    /// Upload a local file
    Put {
        /// Local file to send
        local: PathBuf,
        /// Remote path; defaults to the local file name
        path: Option<String>,
    },
    /// Delete a file or directory
    Rm {
        /// Remote file or directory
        path: String,
    },
    /// Create a directory
    Mkdir {
        /// Remote directory
        path: String,
    },
    /// Unpack an archive already on the instance
    Unzip {
        /// Remote archive
        path: String,
    },
}

/// WebDAV command arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct WebDavArgs {
    /// Location the paths are relative to
    pub location: Location,
    /// What to do
    pub action: WebDavAction,
}

/// Dependencies for the webdav command
pub struct WebDavDependencies {
    /// File access on the instance
    pub webdav: Arc<dyn WebDavClient>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Execute the webdav command with injected dependencies
pub async fn execute_with_deps(args: &WebDavArgs, deps: &WebDavDependencies) -> Result<()> {
    let location = args.location;
    match &args.action {
        WebDavAction::Ls {
            directory,
            filter,
            sort_by_time,
        } => ls(location, directory, filter.as_deref(), *sort_by_time, deps).await,
        WebDavAction::Get { path, destination } => get(location, path, destination.as_deref(), deps).await,
        WebDavAction::Put { local, path } => put(location, local, path.as_deref(), deps).await,
        WebDavAction::Rm { path } => {
            if !deps.webdav.delete(location, path).await? {
                bail!("Could not delete {path}");
            }
            deps.ui.print(&format!("Deleted {path}"));
            Ok(())
        }
        WebDavAction::Mkdir { path } => {
            if !deps.webdav.make_directory(location, path).await? {
                bail!("Could not create directory {path}");
            }
            deps.ui.print(&format!("Created {path}"));
            Ok(())
        }
        WebDavAction::Unzip { path } => {
            if !deps.webdav.decompress_remote_archive(location, path).await? {
                bail!("Could not unzip {path}");
            }
            deps.ui.print(&format!("Extracted {path}"));
            Ok(())
        }
    }
}

async fn ls(
    location: Location,
    directory: &str,
    filter: Option<&str>,
    sort_by_time: bool,
    deps: &WebDavDependencies,
) -> Result<()> {
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("Invalid filter expression")?;

    let mut entries: Vec<RemoteFile> = deps
        .webdav
        .list_directory(location, directory)
        .await
        .with_context(|| format!("Failed to list {}", location.path(directory)))?
        .into_iter()
        .filter(|entry| filter.as_ref().is_none_or(|re| re.is_match(&entry.filename)))
        .collect();

    if sort_by_time {
        entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    } else {
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    }

    for entry in &entries {
        let modified = entry
            .last_modified
            .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default();
        let line = format!("{modified}\t{:>10}\t{}", entry.length, entry.filename);
        if entry.is_directory {
            deps.ui.print_styled(&line, MessageStyle::Blue);
        } else {
            deps.ui.print(&line);
        }
    }
    Ok(())
}

async fn get(location: Location, path: &str, destination: Option<&Path>, deps: &WebDavDependencies) -> Result<()> {
    let Some(info) = deps.webdav.get_info(location, path).await? else {
        bail!("File {path} not found");
    };
    if info.is_directory {
        bail!("{path} is a directory");
    }

    let destination = destination.map_or_else(|| PathBuf::from(&info.filename), Path::to_path_buf);
    debug!(uri = %info.uri, destination = %destination.display(), "downloading");
    let written = deps
        .webdav
        .download(location, path, &destination)
        .await
        .with_context(|| format!("Failed to download {path}"))?;

    deps.ui.print(&format!(
        "Downloaded {} ({written} bytes)",
        destination.display()
    ));
    Ok(())
}

async fn put(location: Location, local: &Path, path: Option<&str>, deps: &WebDavDependencies) -> Result<()> {
    let size = tokio::fs::metadata(local)
        .await
        .with_context(|| format!("Cannot read {}", local.display()))?
        .len();
    let remote = match path {
        Some(path) => path.to_string(),
        None => local
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToString::to_string)
            .with_context(|| format!("Cannot derive a remote name from {}", local.display()))?,
    };

    let stored = upload_with_progress(
        deps.webdav.as_ref(),
        deps.ui.as_ref(),
        location,
        &remote,
        local,
        size,
    )
    .await?;
    if !stored {
        bail!("Upload of {remote} was refused");
    }

    info!(path = %remote, bytes = size, "uploaded file");
    deps.ui
        .print_styled(&format!("Uploaded {remote}"), MessageStyle::Green);
    Ok(())
}

/// Upload `local` while a progress bar follows the bytes sent
pub(crate) async fn upload_with_progress(
    webdav: &dyn WebDavClient,
    ui: &dyn UserInterface,
    location: Location,
    remote: &str,
    local: &Path,
    size: u64,
) -> Result<bool> {
    let bar: Arc<dyn ProgressIndicator> = Arc::from(ui.create_progress_bar(size));
    bar.set_message(remote);
    let observer: Arc<dyn ProgressObserver> = {
        let bar = bar.clone();
        Arc::new(move |sent: u64, total: u64| {
            bar.set_length(total);
            bar.set_position(sent);
        })
    };

    let result = webdav
        .put_file(location, remote, local, observer)
        .await
        .with_context(|| format!("Failed to upload {}", local.display()));
    bar.finish_and_clear();
    result
}

/// Execute the webdav command with default dependencies
pub async fn execute(env: &Environment, args: WebDavArgs) -> Result<()> {
    let webdav = SfccWebDavClient::new(env).context("Cannot reach the instance over WebDAV")?;
    let deps = WebDavDependencies {
        webdav: Arc::new(webdav),
        ui: Arc::new(RealUserInterface),
    };
    execute_with_deps(&args, &deps).await
}

#[cfg(test)]
#[path = "webdav_tests.rs"]
mod tests;
