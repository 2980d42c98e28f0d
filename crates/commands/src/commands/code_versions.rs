//! List and activate the code versions of an instance

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::info;

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::error::ClientResult;
use sfcc_runtime::ocapi::DataApi;
use sfcc_runtime::ocapi::types::CodeVersion;

use crate::ui::RealUserInterface;

/// Code version operations of the Data API
#[async_trait]
pub trait CodeVersionManager: Send + Sync {
    /// All code versions on the instance
    async fn code_versions(&self) -> ClientResult<Vec<CodeVersion>>;

    /// Make `id` the active code version. False if the instance refused.
    async fn activate_code_version(&self, id: &str) -> ClientResult<bool>;
}

#[async_trait]
impl CodeVersionManager for DataApi {
    async fn code_versions(&self) -> ClientResult<Vec<CodeVersion>> {
        Self::code_versions(self).await
    }

    async fn activate_code_version(&self, id: &str) -> ClientResult<bool> {
        Self::activate_code_version(self, id).await
    }
}

/// What to do with code versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeVersionsAction {
    /// Print every code version, marking the active one
    List,
    /// Activate the named code version
    Activate {
        /// Code version id
        id: String,
    },
}

/// Code versions command arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct CodeVersionsArgs {
    /// What to do
    pub action: CodeVersionsAction,
}

/// Dependencies for the code versions command
pub struct CodeVersionsDependencies {
    /// Code version administration
    pub code_versions: Arc<dyn CodeVersionManager>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Execute the code versions command with injected dependencies
pub async fn execute_with_deps(args: &CodeVersionsArgs, deps: &CodeVersionsDependencies) -> Result<()> {
    match &args.action {
        CodeVersionsAction::List => list(deps).await,
        CodeVersionsAction::Activate { id } => activate(id, deps).await,
    }
}

async fn list(deps: &CodeVersionsDependencies) -> Result<()> {
    let versions = deps
        .code_versions
        .code_versions()
        .await
        .context("Failed to list code versions")?;

    if versions.is_empty() {
        deps.ui.print("No code versions found");
        return Ok(());
    }

    for version in &versions {
        let modified = version
            .last_modification_time
            .map_or_else(|| "-".to_string(), |time| time.format("%Y-%m-%dT%H:%M:%S").to_string());
        let line = format!(
            "{} {}\t{}\t{}",
            if version.active { "*" } else { " " },
            version.id,
            modified,
            version.cartridges.join(":")
        );
        if version.active {
            deps.ui.print_styled(&line, MessageStyle::Green);
        } else {
            deps.ui.print(&line);
        }
    }
    Ok(())
}

async fn activate(id: &str, deps: &CodeVersionsDependencies) -> Result<()> {
    deps.ui.print(&format!("Activating code version {id}..."));
    let activated = deps
        .code_versions
        .activate_code_version(id)
        .await
        .with_context(|| format!("Failed to activate code version {id}"))?;
    if !activated {
        bail!("Could not activate code version {id}");
    }

    info!(code_version = id, "activated code version");
    deps.ui
        .print_styled(&format!("Code version {id} is now active"), MessageStyle::Green);
    Ok(())
}

/// Execute the code versions command with default dependencies
pub async fn execute(env: &Environment, args: CodeVersionsArgs) -> Result<()> {
    let api = DataApi::new(env).context("Cannot reach the Data API")?;
    let deps = CodeVersionsDependencies {
        code_versions: Arc::new(api),
        ui: Arc::new(RealUserInterface),
    };
    execute_with_deps(&args, &deps).await
}
