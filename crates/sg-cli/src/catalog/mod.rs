//! Migration catalog baked into the `sg` binary.
//!
//! Each migration is a numbered `.sql` file embedded via `include_str!`.
//! [`MIGRATIONS`] is ordered by version and must only ever grow: published
//! entries are never edited or removed.

use sg_core::{Catalog, CoreResult, Migration, MigrationVersion};

/// All known migrations, in order.
pub static MIGRATIONS: &[Migration] = &[
    Migration::from_static(
        MigrationVersion::new(1),
        "create_users",
        include_str!("v001_create_users.sql"),
    ),
    Migration::from_static(
        MigrationVersion::new(2),
        "add_email_index",
        include_str!("v002_add_email_index.sql"),
    ),
    Migration::from_static(
        MigrationVersion::new(3),
        "create_roles",
        include_str!("v003_create_roles.sql"),
    ),
    Migration::from_static(
        MigrationVersion::new(4),
        "create_user_roles",
        include_str!("v004_create_user_roles.sql"),
    ),
    Migration::from_static(
        MigrationVersion::new(5),
        "create_sessions",
        include_str!("v005_create_sessions.sql"),
    ),
];

/// Validated baked catalog.
pub(crate) fn baked() -> CoreResult<Catalog> {
    Catalog::from_static(MIGRATIONS)
}
