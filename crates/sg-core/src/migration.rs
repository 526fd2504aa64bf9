//! Migration definitions and the ordered migration catalog.
//!
//! A [`Catalog`] is the fixed, ordered list of migrations an application
//! expects to find applied. Applications usually bake it in with
//! `include_str!` and a `static` slice:
//!
//! ```
//! use sg_core::{Catalog, Migration, MigrationVersion};
//!
//! static MIGRATIONS: &[Migration] = &[
//!     Migration::from_static(
//!         MigrationVersion::new(1),
//!         "create_users",
//!         "CREATE TABLE users (id INTEGER PRIMARY KEY);",
//!     ),
//!     Migration::from_static(
//!         MigrationVersion::new(2),
//!         "add_email_index",
//!         "CREATE INDEX users_email ON users (id);",
//!     ),
//! ];
//!
//! let catalog = Catalog::from_static(MIGRATIONS).unwrap();
//! assert_eq!(catalog.len(), 2);
//! ```

use crate::checksum::compute_checksum;
use crate::error::{CoreError, CoreResult};
use crate::version::MigrationVersion;
use std::borrow::Cow;

/// A single, immutable schema migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Version token; unique within a catalog.
    pub version: MigrationVersion,
    /// Human-readable name, e.g. `create_users`.
    pub name: Cow<'static, str>,
    /// SQL script executed as one batch.
    pub sql: Cow<'static, str>,
    /// Whether the script may run inside a transaction together with its
    /// ledger entry. Scripts such as `CREATE INDEX CONCURRENTLY` must set
    /// this to `false` and are applied in two steps.
    pub transactional: bool,
}

impl Migration {
    /// Build a transactional migration from static strings (usable in `static` items).
    pub const fn from_static(
        version: MigrationVersion,
        name: &'static str,
        sql: &'static str,
    ) -> Self {
        Self {
            version,
            name: Cow::Borrowed(name),
            sql: Cow::Borrowed(sql),
            transactional: true,
        }
    }

    /// Build a transactional migration from owned strings.
    pub fn new(version: MigrationVersion, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: Cow::Owned(name.into()),
            sql: Cow::Owned(sql.into()),
            transactional: true,
        }
    }

    /// Mark the migration as non-transactional.
    pub const fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    /// SHA-256 checksum of the migration SQL.
    pub fn checksum(&self) -> String {
        compute_checksum(&self.sql)
    }

    /// `v003 create_roles`-style label used in logs and diagnostics.
    pub fn label(&self) -> String {
        format!("{} {}", self.version, self.name)
    }
}

/// Ordered, validated set of migrations.
///
/// Invariant: versions are unique and strictly increasing, names and SQL are
/// non-empty.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: Vec<Migration>,
}

impl Catalog {
    /// Validate and wrap an ordered list of migrations.
    pub fn new(migrations: Vec<Migration>) -> CoreResult<Self> {
        for migration in &migrations {
            if migration.name.trim().is_empty() {
                return Err(CoreError::InvalidMigration {
                    version: migration.version,
                    reason: "name is empty".to_string(),
                });
            }
            if migration.sql.trim().is_empty() {
                return Err(CoreError::InvalidMigration {
                    version: migration.version,
                    reason: format!("'{}' has no SQL", migration.name),
                });
            }
        }

        for pair in migrations.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.version == prev.version {
                return Err(CoreError::DuplicateVersion {
                    version: next.version,
                    first: prev.name.to_string(),
                    second: next.name.to_string(),
                });
            }
            if next.version < prev.version {
                return Err(CoreError::VersionOutOfOrder {
                    version: next.version,
                    name: next.name.to_string(),
                    previous: prev.version,
                });
            }
        }

        Ok(Self { migrations })
    }

    /// Validate a `static` migration slice.
    pub fn from_static(migrations: &'static [Migration]) -> CoreResult<Self> {
        Self::new(migrations.to_vec())
    }

    /// Migrations in catalog order.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Look up a migration by version.
    pub fn get(&self, version: MigrationVersion) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    /// Whether `version` is part of the catalog.
    pub fn contains(&self, version: MigrationVersion) -> bool {
        self.get(version).is_some()
    }

    /// Highest version in the catalog, if any.
    pub fn latest(&self) -> Option<MigrationVersion> {
        self.migrations.last().map(|m| m.version)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
