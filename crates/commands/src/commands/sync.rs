//! Upload the cartridges of a local project as a code version
//!
//! A cartridge is any directory holding a `.project` file. All cartridges
//! found are zipped under `{code_version}/{cartridge}/`, uploaded to the
//! `Cartridges` location and unpacked there by the instance.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::ocapi::DataApi;
use sfcc_runtime::webdav::{Location, SfccWebDavClient, WebDavClient};

use crate::commands::code_versions::CodeVersionManager;
use crate::commands::webdav::upload_with_progress;
use crate::ui::RealUserInterface;

const PROJECT_FILE: &str = ".project";
const SKIPPED_DIRECTORY: &str = "node_modules";

/// A cartridge found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    /// Directory name, used as the cartridge name
    pub name: String,
    /// Directory holding the `.project` file
    pub path: PathBuf,
}

/// Sync command arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct SyncArgs {
    /// Directory searched for cartridges
    pub directory: PathBuf,
    /// Delete the code version before uploading and activate it afterwards
    pub delete_and_reactivate: bool,
}

/// Dependencies for the sync command
pub struct SyncDependencies {
    /// File transfer to the instance
    pub webdav: Arc<dyn WebDavClient>,
    /// Code version activation
    pub code_versions: Arc<dyn CodeVersionManager>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Execute the sync command with injected dependencies.
///
/// Returns the process exit code: 1 when nothing was found to upload or the
/// instance refused a step.
pub async fn execute_with_deps(args: &SyncArgs, env: &Environment, deps: &SyncDependencies) -> Result<i32> {
    let code_version = env
        .code_version
        .as_deref()
        .filter(|code_version| !code_version.is_empty())
        .context("A code version must be configured to sync cartridges")?;

    let directory = args.directory.clone();
    let cartridges = tokio::task::spawn_blocking(move || find_cartridges(&directory))
        .await
        .context("Cartridge scan did not complete")??;
    debug!(
        cartridges = cartridges.len(),
        directory = %args.directory.display(),
        "found cartridges"
    );
    if cartridges.is_empty() {
        deps.ui.print_styled(
            &format!("No cartridges found in {}", args.directory.display()),
            MessageStyle::Yellow,
        );
        return Ok(1);
    }
    for cartridge in &cartridges {
        deps.ui.print(&format!("Collecting {}...", cartridge.name));
    }

    if args.delete_and_reactivate {
        deps.ui
            .print(&format!("Deleting code version {code_version}"));
        let deleted = deps
            .webdav
            .delete(Location::Cartridges, code_version)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "code version delete failed");
                false
            });
        if !deleted {
            deps.ui.print_styled(
                "Code version was not deleted (may not exist)",
                MessageStyle::Yellow,
            );
        }
    }

    deps.ui.print(&format!(
        "Syncing code version {code_version} on {}",
        env.server
    ));
    let (archive, size) = {
        let code_version = code_version.to_string();
        tokio::task::spawn_blocking(move || build_archive(&cartridges, &code_version))
            .await
            .context("Archive build did not complete")??
    };

    let remote = format!("{code_version}.zip");
    let uploaded = upload_with_progress(
        deps.webdav.as_ref(),
        deps.ui.as_ref(),
        Location::Cartridges,
        &remote,
        archive.path(),
        size,
    )
    .await?;
    if !uploaded {
        return Ok(refused(deps.ui.as_ref(), "Could not upload code version"));
    }

    deps.ui.print("Extracting...");
    if !deps
        .webdav
        .decompress_remote_archive(Location::Cartridges, &remote)
        .await
        .context("Failed to unzip code version")?
    {
        return Ok(refused(deps.ui.as_ref(), "Could not unzip code version"));
    }
    info!(code_version, server = %env.server, "synced cartridges");
    deps.ui.print_styled(
        &format!("Successfully synced cartridges with {}", env.server),
        MessageStyle::Green,
    );

    if args.delete_and_reactivate {
        deps.ui.print("Activating code version...");
        if !deps
            .code_versions
            .activate_code_version(code_version)
            .await
            .context("Failed to activate code version")?
        {
            return Ok(refused(deps.ui.as_ref(), "Could not activate code version"));
        }
    }
    Ok(0)
}

fn refused(ui: &dyn UserInterface, message: &str) -> i32 {
    error!("{message}");
    ui.print_styled(message, MessageStyle::Red);
    1
}

/// Execute the sync command with default dependencies
pub async fn execute(env: &Environment, args: SyncArgs) -> Result<i32> {
    let webdav = SfccWebDavClient::new(env).context("Cannot reach the instance over WebDAV")?;
    let api = DataApi::new(env).context("Cannot reach the Data API")?;
    let deps = SyncDependencies {
        webdav: Arc::new(webdav),
        code_versions: Arc::new(api),
        ui: Arc::new(RealUserInterface),
    };
    execute_with_deps(&args, env, &deps).await
}

/// Cartridges under `root`, ordered by path. Anything below a
/// `node_modules` directory is ignored.
pub fn find_cartridges(root: &Path) -> Result<Vec<Cartridge>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot read {}", root.display()))?;

    let mut cartridges = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != SKIPPED_DIRECTORY);
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if !entry.file_type().is_file() || entry.file_name() != PROJECT_FILE {
            continue;
        }
        let Some(directory) = entry.path().parent() else {
            continue;
        };
        let Some(name) = directory.file_name() else {
            continue;
        };
        cartridges.push(Cartridge {
            name: name.to_string_lossy().into_owned(),
            path: directory.to_path_buf(),
        });
    }
    Ok(cartridges)
}

/// Zip `cartridges` into a temporary file, returning it with its size
pub fn build_archive(cartridges: &[Cartridge], code_version: &str) -> Result<(NamedTempFile, u64)> {
    let archive = NamedTempFile::new().context("Failed to create archive file")?;
    write_archive(cartridges, code_version, archive.as_file())?;
    let size = archive
        .as_file()
        .metadata()
        .context("Failed to read archive size")?
        .len();
    Ok((archive, size))
}

/// Zip every file of `cartridges` into `writer` as
/// `{code_version}/{cartridge}/{relative path}`
pub fn write_archive<W: Write + Seek>(cartridges: &[Cartridge], code_version: &str, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for cartridge in cartridges {
        for entry in WalkDir::new(&cartridge.path)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("Failed to scan {}", cartridge.path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&cartridge.path)?;
            zip.start_file(entry_name(code_version, &cartridge.name, relative), options)?;
            let mut source = File::open(entry.path())
                .with_context(|| format!("Cannot read {}", entry.path().display()))?;
            io::copy(&mut source, &mut zip)?;
        }
    }

    Ok(zip.finish()?)
}

fn entry_name(code_version: &str, cartridge: &str, relative: &Path) -> String {
    let mut name = format!("{code_version}/{cartridge}");
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
