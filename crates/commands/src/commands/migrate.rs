//! Compare an instance's migration history against the project's

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use sfcc_runtime::config::Environment;
use sfcc_runtime::deps::{MessageStyle, UserInterface};
use sfcc_runtime::error::ClientResult;
use sfcc_runtime::migrations::{Migration, MigrationContext};
use sfcc_runtime::ocapi::DataApi;
use sfcc_runtime::ocapi::types::OrganizationPreferences;

use crate::ui::RealUserInterface;

/// Preference group holding the migration history
pub const DEFAULT_PREFERENCE_GROUP: &str = "dwreMigrate";

/// Instance type whose preferences are read
pub const DEFAULT_INSTANCE_TYPE: &str = "current";

/// Reads organization preferences
#[async_trait]
pub trait PreferencesReader: Send + Sync {
    /// Preferences of `group` for `instance_type`
    async fn global_preferences(&self, group: &str, instance_type: &str) -> ClientResult<OrganizationPreferences>;
}

#[async_trait]
impl PreferencesReader for DataApi {
    async fn global_preferences(&self, group: &str, instance_type: &str) -> ClientResult<OrganizationPreferences> {
        Self::global_preferences(self, group, instance_type).await
    }
}

/// Migrate status arguments (matches CLI parser)
#[derive(Debug, Clone)]
pub struct MigrateStatusArgs {
    /// Project migration ids in application order, comma separated
    pub migrations: String,
    /// Project hotfix ids, comma separated
    pub hotfixes: String,
    /// Preference group holding the migration attributes
    pub group: String,
    /// Instance type whose preferences are read
    pub instance_type: String,
}

impl MigrateStatusArgs {
    /// Arguments reading the default preference group of the current instance type
    pub fn new(migrations: impl Into<String>, hotfixes: impl Into<String>) -> Self {
        Self {
            migrations: migrations.into(),
            hotfixes: hotfixes.into(),
            group: DEFAULT_PREFERENCE_GROUP.to_string(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
        }
    }

    fn project_context(&self) -> MigrationContext {
        MigrationContext::complete(split_list(&self.migrations), split_list(&self.hotfixes))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|id| !id.is_empty())
}

/// Dependencies for the migrate command
pub struct MigrateDependencies {
    /// Source of the instance history
    pub preferences: Arc<dyn PreferencesReader>,
    /// User interface for output
    pub ui: Arc<dyn UserInterface>,
}

/// Print what the project would still apply to the instance.
///
/// Returns the pending difference. Fails when the instance has history the
/// project does not know about.
pub async fn status_with_deps(args: &MigrateStatusArgs, deps: &MigrateDependencies) -> Result<MigrationContext> {
    let preferences = deps
        .preferences
        .global_preferences(&args.group, &args.instance_type)
        .await
        .context("Failed to read migration preferences")?;
    let instance = preferences
        .migration_context()
        .context("Instance migration preferences are inconsistent")?;
    debug!(
        migrations = instance.migrations.len(),
        hotfixes = instance.hotfixes.len(),
        "loaded instance migration history"
    );

    let current = instance
        .current
        .as_ref()
        .map_or_else(|| "(none)".to_string(), |migration| migration.id.clone());
    deps.ui.print(&format!("Instance version: {current}"));

    let pending = args
        .project_context()
        .difference(&instance)
        .context("Instance migration history diverges from the project")?;

    if pending.is_empty() {
        deps.ui
            .print_styled("Instance is up to date", MessageStyle::Green);
        return Ok(pending);
    }

    print_section(deps.ui.as_ref(), "Missing migrations:", &pending.migrations);
    print_section(deps.ui.as_ref(), "Missing hotfixes:", &pending.hotfixes);
    Ok(pending)
}

fn print_section(ui: &dyn UserInterface, title: &str, migrations: &[Migration]) {
    if migrations.is_empty() {
        return;
    }
    ui.print_styled(title, MessageStyle::Yellow);
    for migration in migrations {
        ui.print(&format!("  {}", migration.id));
    }
}

/// Execute migrate status with default dependencies
pub async fn status(env: &Environment, args: MigrateStatusArgs) -> Result<()> {
    let api = DataApi::new(env).context("Cannot reach the Data API")?;
    let deps = MigrateDependencies {
        preferences: Arc::new(api),
        ui: Arc::new(RealUserInterface),
    };
    status_with_deps(&args, &deps).await.map(|_| ())
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
