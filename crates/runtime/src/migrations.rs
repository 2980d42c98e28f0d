//! Migration chain differencer
//!
//! A [`MigrationContext`] records which configuration migrations (an ordered
//! chain, each linked to its parent) and hotfixes (unordered, parentless) make
//! up an environment's history. Comparing the authoritative chain from a
//! project with the partial chain recorded on an instance yields the
//! migrations still to apply, or fails if the instance's history diverged.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One node in a migration chain, or a hotfix when it has no parent.
///
/// Equality and hashing consider `id` and `parent_id` only: the same id under
/// a different parent belongs to another branch of history.
#[derive(Debug, Clone, Default)]
pub struct Migration {
    /// Migration id, unique within a chain
    pub id: String,
    /// Id of the migration applied just before this one
    pub parent_id: Option<String>,
    /// Free text shown to operators
    pub description: Option<String>,
    /// Where the migration's files live in the project
    pub location: Option<String>,
}

impl Migration {
    /// Migration `id` applied after `parent_id`
    pub fn new(id: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            ..Self::default()
        }
    }

    /// A parentless migration
    pub fn hotfix(id: impl Into<String>) -> Self {
        Self::new(id, None)
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a project location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl PartialEq for Migration {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.parent_id == other.parent_id
    }
}

impl Eq for Migration {}

impl Hash for Migration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.parent_id.hash(state);
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent_id {
            Some(parent) => write!(f, "{} (after {parent})", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Histories that cannot be reconciled automatically
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The compared history holds migrations the reference chain does not
    #[error("target migrations context has unrecognized migrations: {}", ids(.related))]
    Unrecognized {
        /// The offending migrations, in the compared history's order
        related: Vec<Migration>,
    },

    /// The current marker names a migration outside the chain
    #[error("current migration {0} is not part of the migration path")]
    UnknownCurrent(String),
}

impl MigrationError {
    /// Migrations responsible for the failure
    pub fn related_migrations(&self) -> &[Migration] {
        match self {
            Self::Unrecognized { related } => related,
            Self::UnknownCurrent(_) => &[],
        }
    }
}

fn ids(migrations: &[Migration]) -> String {
    migrations
        .iter()
        .map(|migration| migration.id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Applied (or applicable) history of an environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationContext {
    /// Migration chain, oldest first
    pub migrations: Vec<Migration>,
    /// Hotfixes, in no particular order
    pub hotfixes: Vec<Migration>,
    /// Last applied migration, None when nothing was applied
    pub current: Option<Migration>,
    /// Whether this record comes from an authoritative source rather than
    /// being reconstructed for comparison
    pub is_complete: bool,
}

impl MigrationContext {
    /// Build an authoritative context from ordered migration ids and hotfix
    /// ids. Each migration's parent is the id before it.
    pub fn complete<I, S, H, T>(migrations: I, hotfixes: H) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        H: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let migrations = chain(migrations);
        Self {
            current: migrations.last().cloned(),
            migrations,
            hotfixes: hotfixes
                .into_iter()
                .map(|id| Migration::hotfix(id.as_ref()))
                .collect(),
            is_complete: true,
        }
    }

    /// Reconstruct a comparison-only context from the comma separated lists
    /// an instance stores in its preferences.
    ///
    /// Blank entries are ignored. An empty `current` means nothing has been
    /// applied; otherwise it must name one of the migrations.
    pub fn from_comma_separated(
        current: &str,
        migrations: &str,
        hotfixes: &str,
    ) -> Result<Self, MigrationError> {
        let migrations = chain(split_ids(migrations));

        let current = current.trim();
        let current = if current.is_empty() {
            None
        } else {
            let found = migrations
                .iter()
                .find(|migration| migration.id == current)
                .cloned()
                .ok_or_else(|| MigrationError::UnknownCurrent(current.to_string()))?;
            Some(found)
        };

        Ok(Self {
            migrations,
            hotfixes: split_ids(hotfixes).map(Migration::hotfix).collect(),
            current,
            is_complete: false,
        })
    }

    /// Migrations and hotfixes present here but not yet in `other`.
    ///
    /// `other` must be a prefix of this chain under migration equality; any
    /// migration of `other` that this context does not know (including a
    /// known id under a different parent) fails the comparison.
    pub fn difference(&self, other: &Self) -> Result<Self, MigrationError> {
        let known: HashSet<&Migration> = self.migrations.iter().collect();
        let theirs: HashSet<&Migration> = other.migrations.iter().collect();

        let intersection = theirs.iter().filter(|m| known.contains(*m)).count();
        if intersection < other.migrations.len() {
            let mut seen = HashSet::new();
            let related = other
                .migrations
                .iter()
                .filter(|m| !known.contains(m) && seen.insert(*m))
                .cloned()
                .collect();
            return Err(MigrationError::Unrecognized { related });
        }

        let mut seen = HashSet::new();
        let migrations = self
            .migrations
            .iter()
            .filter(|m| !theirs.contains(m) && seen.insert(*m))
            .cloned()
            .collect();

        let applied: HashSet<&str> = other.hotfixes.iter().map(|h| h.id.as_str()).collect();
        let mut seen = HashSet::new();
        let hotfixes = self
            .hotfixes
            .iter()
            .filter(|h| !applied.contains(h.id.as_str()) && seen.insert(h.id.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            migrations,
            hotfixes,
            current: None,
            is_complete: false,
        })
    }

    /// Nothing left to apply
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty() && self.hotfixes.is_empty()
    }
}

fn split_ids(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|id| !id.is_empty())
}

fn chain<I, S>(ids: I) -> Vec<Migration>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parent: Option<String> = None;
    ids.into_iter()
        .map(|id| {
            let id = id.as_ref().to_string();
            Migration {
                parent_id: parent.replace(id.clone()),
                id,
                ..Migration::default()
            }
        })
        .collect()
}
