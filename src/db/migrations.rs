// Icon table schema management
// The icon table is a cache, not a record of truth: a version mismatch in
// either direction drops the table instead of migrating it.

use rusqlite::Connection;

use crate::constants::{
    COLUMN_COMPONENT, COLUMN_ICON, COLUMN_ICON_LOW_RES, COLUMN_LABEL, COLUMN_LAST_UPDATED,
    COLUMN_SYSTEM_STATE, COLUMN_USER, COLUMN_VERSION, RELEASE_VERSION, TABLE_NAME,
};
use crate::error::Result;

/// Schema version for a given icon size: release number in the high bits,
/// pixel size in the low 16.
pub fn expected_schema_version(icon_pixel_size: u32) -> u32 {
    (RELEASE_VERSION << 16) + icon_pixel_size
}

/// Icon size encoded in a schema version written by this release.
pub fn icon_size_from_version(version: u32) -> Option<u32> {
    (version >> 16 == RELEASE_VERSION && version & 0xFFFF != 0).then_some(version & 0xFFFF)
}

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            {component} TEXT NOT NULL,
            {user} INTEGER NOT NULL,
            {last_updated} INTEGER NOT NULL DEFAULT 0,
            {version} INTEGER NOT NULL DEFAULT 0,
            {icon} BLOB,
            {icon_low_res} BLOB,
            {label} TEXT,
            {system_state} TEXT,
            PRIMARY KEY ({component}, {user})
        );",
        table = TABLE_NAME,
        component = COLUMN_COMPONENT,
        user = COLUMN_USER,
        last_updated = COLUMN_LAST_UPDATED,
        version = COLUMN_VERSION,
        icon = COLUMN_ICON,
        icon_low_res = COLUMN_ICON_LOW_RES,
        label = COLUMN_LABEL,
        system_state = COLUMN_SYSTEM_STATE,
    ))?;
    Ok(())
}

/// Drop the icon table and create it empty.
pub fn drop_and_recreate(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", TABLE_NAME))?;
    create_table(conn)
}

/// Bring the database to the schema for `icon_pixel_size` (crash-safe).
/// Returns true if existing data was discarded.
pub fn ensure_schema(conn: &Connection, icon_pixel_size: u32) -> Result<bool> {
    let current_version = get_schema_version(conn)?;
    let target_version = expected_schema_version(icon_pixel_size);

    if current_version == target_version {
        create_table(conn)?;
        return Ok(false);
    }

    let tx = conn.unchecked_transaction()?;
    drop_and_recreate(&tx)?;
    tx.execute_batch(&format!("PRAGMA user_version = {}", target_version))?;
    tx.commit()?;

    if current_version != 0 {
        log::info!(
            "Icon DB schema {} does not match {}; discarded cached icons",
            current_version,
            target_version
        );
    }

    Ok(current_version != 0)
}
