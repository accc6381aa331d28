// Database module: the persistent icon store

pub mod migrations;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OpenFlags};

use crate::constants::BUSY_TIMEOUT_MS;
use crate::error::Result;

pub use schema::{IconColumn, IconRecord, IconRow, Selection};

/// Durable, versioned icon table.
///
/// The connection sits behind its own mutex. Callers that also hold the
/// cache lock must take it first.
pub struct IconDb {
    conn: Mutex<Connection>,
    icon_pixel_size: u32,
}

impl IconDb {
    /// Open or create the store at `db_path`, discarding it if it was written
    /// for another release or icon size.
    pub fn open(db_path: &Path, icon_pixel_size: u32) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;

        Self::from_connection(conn, icon_pixel_size)
    }

    pub fn open_in_memory(icon_pixel_size: u32) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, icon_pixel_size)
    }

    fn from_connection(conn: Connection, icon_pixel_size: u32) -> Result<Self> {
        migrations::ensure_schema(&conn, icon_pixel_size)?;
        Ok(Self {
            conn: Mutex::new(conn),
            icon_pixel_size,
        })
    }

    /// Icon size an existing store was written for, without modifying it.
    /// `None` when the file is missing or from another release.
    pub fn stored_icon_size(db_path: &Path) -> Result<Option<u32>> {
        if !db_path.exists() {
            return Ok(None);
        }
        // No CREATE flag: a missing file is an error, never a new store
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        let version = migrations::get_schema_version(&conn)?;
        Ok(migrations::icon_size_from_version(version))
    }

    pub fn icon_pixel_size(&self) -> u32 {
        self.icon_pixel_size
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows matching `selection`. Read failures are logged and reported as
    /// no rows.
    pub fn query(&self, columns: &[IconColumn], selection: &Selection<'_>) -> Vec<IconRow> {
        let mut rows = Vec::new();
        let result = schema::query_rows(&self.lock(), columns, selection, |row| rows.push(row));
        if let Err(e) = result {
            log::warn!("Icon DB query failed, treating as miss: {}", e);
            rows.clear();
        }
        rows
    }

    /// First row matching `selection`, if any.
    pub fn query_one(&self, columns: &[IconColumn], selection: &Selection<'_>) -> Option<IconRow> {
        self.query(columns, selection).into_iter().next()
    }

    /// Streaming query. Unlike [`IconDb::query`] the error is returned, after
    /// any rows read before it have been delivered.
    pub fn query_with<F>(&self, columns: &[IconColumn], selection: &Selection<'_>, f: F) -> Result<usize>
    where
        F: FnMut(IconRow),
    {
        schema::query_rows(&self.lock(), columns, selection, f)
    }

    pub fn insert_or_replace(&self, record: &IconRecord) -> Result<()> {
        schema::insert_or_replace(&self.lock(), record)
    }

    pub fn delete(&self, selection: &Selection<'_>) -> Result<usize> {
        schema::delete_rows(&self.lock(), selection)
    }

    pub fn drop_and_recreate(&self) -> Result<()> {
        migrations::drop_and_recreate(&self.lock())
    }

    pub fn row_count(&self, selection: &Selection<'_>) -> Result<i64> {
        schema::count_rows(&self.lock(), selection)
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_schema_version(&self.lock())
    }
}
