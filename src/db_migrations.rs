use rusqlite::{Connection, Result};

/// schema version written by the current build
pub const CURRENT_VERSION: u64 = 1;

/// incrementally upgrades the database for each version the database is behind.
/// v1 is the current schema; future versions ladder on here the same way
pub fn migrate_db(_con: &Connection, table_version: u64) -> Result<()> {
    if table_version > CURRENT_VERSION {
        log::warn!(
            "Database version {table_version} is newer than this build understands ({CURRENT_VERSION})"
        );
    }
    Ok(())
}
