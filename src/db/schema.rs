// Icon table row types and query helpers

use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

use crate::constants::{
    COLUMN_COMPONENT, COLUMN_ICON, COLUMN_ICON_LOW_RES, COLUMN_LABEL, COLUMN_LAST_UPDATED,
    COLUMN_ROWID, COLUMN_SYSTEM_STATE, COLUMN_USER, COLUMN_VERSION, TABLE_NAME,
};
use crate::error::Result;

// ----- Columns -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconColumn {
    RowId,
    Component,
    ProfileSerial,
    LastUpdated,
    Version,
    Icon,
    IconLowRes,
    Label,
    SystemState,
}

impl IconColumn {
    pub fn sql_name(self) -> &'static str {
        match self {
            IconColumn::RowId => COLUMN_ROWID,
            IconColumn::Component => COLUMN_COMPONENT,
            IconColumn::ProfileSerial => COLUMN_USER,
            IconColumn::LastUpdated => COLUMN_LAST_UPDATED,
            IconColumn::Version => COLUMN_VERSION,
            IconColumn::Icon => COLUMN_ICON,
            IconColumn::IconLowRes => COLUMN_ICON_LOW_RES,
            IconColumn::Label => COLUMN_LABEL,
            IconColumn::SystemState => COLUMN_SYSTEM_STATE,
        }
    }

    /// Image column for the requested tier.
    pub fn icon_for(low_res: bool) -> Self {
        if low_res {
            IconColumn::IconLowRes
        } else {
            IconColumn::Icon
        }
    }
}

// ----- Rows -----

/// A partially-populated row: only the queried columns are `Some`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IconRow {
    pub row_id: Option<i64>,
    pub component: Option<String>,
    pub profile_serial: Option<i64>,
    pub last_updated: Option<i64>,
    pub version: Option<i64>,
    pub icon: Option<Vec<u8>>,
    pub icon_low_res: Option<Vec<u8>>,
    pub label: Option<String>,
    pub system_state: Option<String>,
}

impl IconRow {
    fn from_row(row: &Row<'_>, columns: &[IconColumn]) -> rusqlite::Result<Self> {
        let mut out = IconRow::default();
        for (i, column) in columns.iter().enumerate() {
            match column {
                IconColumn::RowId => out.row_id = row.get(i)?,
                IconColumn::Component => out.component = row.get(i)?,
                IconColumn::ProfileSerial => out.profile_serial = row.get(i)?,
                IconColumn::LastUpdated => out.last_updated = row.get(i)?,
                IconColumn::Version => out.version = row.get(i)?,
                IconColumn::Icon => out.icon = row.get(i)?,
                IconColumn::IconLowRes => out.icon_low_res = row.get(i)?,
                IconColumn::Label => out.label = row.get(i)?,
                IconColumn::SystemState => out.system_state = row.get(i)?,
            }
        }
        Ok(out)
    }

    /// Image bytes for the requested tier, if that column was selected.
    pub fn icon_bytes(&self, low_res: bool) -> Option<&[u8]> {
        if low_res {
            self.icon_low_res.as_deref()
        } else {
            self.icon.as_deref()
        }
    }
}

/// A complete row as written by insert-or-replace.
#[derive(Debug, Clone, PartialEq)]
pub struct IconRecord {
    pub component: String,
    pub profile_serial: i64,
    pub last_updated: i64,
    pub version: i64,
    pub icon: Vec<u8>,
    pub icon_low_res: Vec<u8>,
    pub label: String,
    pub system_state: String,
}

// ----- Selections -----

/// WHERE-clause predicates understood by the store.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    All,
    Profile(i64),
    Component { component: &'a str, profile_serial: i64 },
    /// Every component of a package for one profile.
    Package { package: &'a str, profile_serial: i64 },
    /// Batch by rowid, rendered as a single `IN (...)` clause.
    RowIds(&'a [i64]),
}

impl Selection<'_> {
    /// Render as `(where_clause, bound_values)`.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        match *self {
            Selection::All => ("1".to_string(), Vec::new()),
            Selection::Profile(serial) => (
                format!("{} = ?1", COLUMN_USER),
                vec![Value::Integer(serial)],
            ),
            Selection::Component { component, profile_serial } => (
                format!("{} = ?1 AND {} = ?2", COLUMN_COMPONENT, COLUMN_USER),
                vec![Value::Text(component.to_string()), Value::Integer(profile_serial)],
            ),
            Selection::Package { package, profile_serial } => (
                format!("{} LIKE ?1 ESCAPE '\\' AND {} = ?2", COLUMN_COMPONENT, COLUMN_USER),
                vec![
                    Value::Text(format!("{}/%", escape_like(package))),
                    Value::Integer(profile_serial),
                ],
            ),
            Selection::RowIds(ids) => {
                let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
                (format!("{} IN ({})", COLUMN_ROWID, list), Vec::new())
            }
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ----- Queries -----

/// Stream matching rows into `f`. A read error stops the scan and is
/// returned; rows already handed to `f` stay handed over.
pub fn query_rows<F>(conn: &Connection, columns: &[IconColumn], selection: &Selection<'_>, mut f: F) -> Result<usize>
where
    F: FnMut(IconRow),
{
    let column_list = columns.iter().map(|c| c.sql_name()).collect::<Vec<_>>().join(", ");
    let (where_clause, values) = selection.to_sql();
    let sql = format!("SELECT {} FROM {} WHERE {}", column_list, TABLE_NAME, where_clause);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(values))?;
    let mut count = 0;
    while let Some(row) = rows.next()? {
        f(IconRow::from_row(row, columns)?);
        count += 1;
    }
    Ok(count)
}

pub fn insert_or_replace(conn: &Connection, record: &IconRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} ({}, {}, {}, {}, {}, {}, {}, {})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            TABLE_NAME,
            COLUMN_COMPONENT,
            COLUMN_USER,
            COLUMN_LAST_UPDATED,
            COLUMN_VERSION,
            COLUMN_ICON,
            COLUMN_ICON_LOW_RES,
            COLUMN_LABEL,
            COLUMN_SYSTEM_STATE,
        ),
        params![
            record.component,
            record.profile_serial,
            record.last_updated,
            record.version,
            record.icon,
            record.icon_low_res,
            record.label,
            record.system_state,
        ],
    )?;
    Ok(())
}

pub fn delete_rows(conn: &Connection, selection: &Selection<'_>) -> Result<usize> {
    if let Selection::RowIds(ids) = selection {
        if ids.is_empty() {
            return Ok(0);
        }
    }
    let (where_clause, values) = selection.to_sql();
    let rows = conn.execute(
        &format!("DELETE FROM {} WHERE {}", TABLE_NAME, where_clause),
        rusqlite::params_from_iter(values),
    )?;
    Ok(rows)
}

pub fn count_rows(conn: &Connection, selection: &Selection<'_>) -> Result<i64> {
    let (where_clause, values) = selection.to_sql();
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {}", TABLE_NAME, where_clause),
        rusqlite::params_from_iter(values),
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::ensure_schema;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, 48).unwrap();
        conn
    }

    fn record(component: &str, serial: i64, version: i64) -> IconRecord {
        IconRecord {
            component: component.to_string(),
            profile_serial: serial,
            last_updated: 1_000,
            version,
            icon: vec![1, 2, 3],
            icon_low_res: vec![4],
            label: "Label".to_string(),
            system_state: "state".to_string(),
        }
    }

    fn components(conn: &Connection, selection: Selection<'_>) -> Vec<String> {
        let mut out = Vec::new();
        query_rows(conn, &[IconColumn::Component], &selection, |row| {
            out.push(row.component.unwrap())
        })
        .unwrap();
        out.sort();
        out
    }

    #[test]
    fn test_insert_or_replace_keeps_one_row_per_key() {
        let conn = setup_test_db();
        insert_or_replace(&conn, &record("com.a/com.a.Main", 0, 1)).unwrap();
        insert_or_replace(&conn, &record("com.a/com.a.Main", 0, 2)).unwrap();
        insert_or_replace(&conn, &record("com.a/com.a.Main", 10, 1)).unwrap();

        assert_eq!(count_rows(&conn, &Selection::All).unwrap(), 2);

        let mut versions = Vec::new();
        query_rows(
            &conn,
            &[IconColumn::Version],
            &Selection::Component { component: "com.a/com.a.Main", profile_serial: 0 },
            |row| versions.push(row.version.unwrap()),
        )
        .unwrap();
        assert_eq!(versions, vec![2]);
    }

    #[test]
    fn test_unselected_columns_stay_none() {
        let conn = setup_test_db();
        insert_or_replace(&conn, &record("com.a/com.a.Main", 0, 1)).unwrap();

        let mut rows = Vec::new();
        query_rows(&conn, &[IconColumn::IconLowRes, IconColumn::Label], &Selection::All, |row| {
            rows.push(row)
        })
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].icon_bytes(true), Some(&[4u8][..]));
        assert_eq!(rows[0].icon_bytes(false), None);
        assert_eq!(rows[0].label.as_deref(), Some("Label"));
    }

    #[test]
    fn test_package_selection_is_literal() {
        let conn = setup_test_db();
        insert_or_replace(&conn, &record("com.my_app/com.my_app.Main", 0, 1)).unwrap();
        insert_or_replace(&conn, &record("com.myXapp/com.myXapp.Main", 0, 1)).unwrap();
        insert_or_replace(&conn, &record("com.my_app.extra/com.my_app.extra.Main", 0, 1)).unwrap();

        assert_eq!(
            components(&conn, Selection::Package { package: "com.my_app", profile_serial: 0 }),
            vec!["com.my_app/com.my_app.Main".to_string()]
        );
    }

    #[test]
    fn test_batch_delete_by_rowid() {
        let conn = setup_test_db();
        for name in ["a/a.A", "b/b.B", "c/c.C"] {
            insert_or_replace(&conn, &record(name, 0, 1)).unwrap();
        }

        let mut ids = Vec::new();
        query_rows(&conn, &[IconColumn::RowId, IconColumn::Component], &Selection::All, |row| {
            if row.component.as_deref() != Some("b/b.B") {
                ids.push(row.row_id.unwrap());
            }
        })
        .unwrap();

        assert_eq!(delete_rows(&conn, &Selection::RowIds(&ids)).unwrap(), 2);
        assert_eq!(components(&conn, Selection::All), vec!["b/b.B".to_string()]);
        assert_eq!(delete_rows(&conn, &Selection::RowIds(&[])).unwrap(), 0);
    }

    #[test]
    fn test_rowid_selection_sql() {
        let (sql, values) = Selection::RowIds(&[3, 7, 9]).to_sql();
        assert_eq!(sql, "rowid IN (3,7,9)");
        assert!(values.is_empty());
    }
}
