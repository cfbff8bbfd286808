pub mod stage;
pub mod activity;
pub mod work_unit;
pub mod input;
pub mod production;
pub mod style;
pub mod rule;
pub mod qgis;
pub mod layer;
pub mod fme;
pub mod profile;

pub use stage::*;
pub use activity::*;
pub use work_unit::*;
pub use input::*;
pub use production::*;
pub use style::*;
pub use rule::*;
pub use qgis::*;
pub use layer::*;
pub use fme::*;
pub use profile::*;

use anyhow::{Context, Result};
use rusqlite::types::{ToSql, Value};
use rusqlite::vtab::array::Array;
use rusqlite::{params_from_iter, Connection, ParamsFromIter};
use std::rc::Rc;
use crate::error::SapError;

/// Subquery over the id array bound at parameter `?{index}`, for `... IN (id_list)`
///
/// The whole id set is a single bound value, so batches are not limited by
/// SQLite's host parameter count.
pub(crate) fn id_list(index: usize) -> String {
    format!("SELECT value FROM rarray(?{})", index)
}

/// Leading parameters followed by the id set as one array value
pub(crate) fn with_ids<'a>(
    leading: &[&'a dyn ToSql],
    ids: &[i64],
) -> ParamsFromIter<Vec<Box<dyn ToSql + 'a>>> {
    let mut params: Vec<Box<dyn ToSql + 'a>> = leading
        .iter()
        .map(|param| Box::new(*param) as Box<dyn ToSql + 'a>)
        .collect();
    let array: Array = Rc::new(ids.iter().copied().map(Value::Integer).collect());
    params.push(Box::new(array));
    params_from_iter(params)
}

/// Fail with a validation error unless every id names a row of `table`
///
/// Compares the number of matching rows with the number of ids requested; a
/// request repeating an id therefore fails even when every id exists.
pub(crate) fn ensure_ids_exist(conn: &Connection, table: &str, ids: &[i64], message: &str) -> Result<()> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE id IN ({})",
        table,
        id_list(1)
    );
    let found: i64 = conn
        .query_row(&sql, with_ids(&[], ids), |row| row.get(0))
        .with_context(|| format!("Failed to look up {} ids", table))?;
    if (found as usize) < ids.len() {
        log::warn!("{}: requested {} ids, found {}", table, ids.len(), found);
        return Err(SapError::Validation(message.to_string()).into());
    }
    Ok(())
}

/// Fail with a conflict error if any row of `table` references the ids through `column`
pub(crate) fn ensure_not_referenced(
    conn: &Connection,
    table: &str,
    column: &str,
    ids: &[i64],
    message: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} IN ({}))",
        table,
        column,
        id_list(1)
    );
    let referenced: bool = conn
        .query_row(&sql, with_ids(&[], ids), |row| row.get(0))
        .with_context(|| format!("Failed to check references in {}", table))?;
    if referenced {
        log::warn!("Deletion blocked: {} still references {:?}", table, ids);
        return Err(SapError::Conflict(message.to_string()).into());
    }
    Ok(())
}

/// Delete rows of `table` by id, returning the number deleted
pub(crate) fn delete_by_ids(conn: &Connection, table: &str, ids: &[i64]) -> Result<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE id IN ({})",
        table,
        id_list(1)
    );
    conn.execute(&sql, with_ids(&[], ids))
        .with_context(|| format!("Failed to delete from {}", table))
}

/// Reference that blocks deletion: (referencing table, column, conflict message)
pub(crate) type DeleteGuard<'a> = (&'a str, &'a str, &'a str);

/// Delete rows by id in one transaction, after checking that every id exists
/// and that no guard table still references them
pub(crate) fn guarded_delete(
    conn: &Connection,
    table: &str,
    ids: &[i64],
    missing_message: &str,
    guards: &[DeleteGuard<'_>],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    ensure_ids_exist(&tx, table, ids, missing_message)?;
    for (guard_table, column, message) in guards {
        ensure_not_referenced(&tx, guard_table, column, ids, message)?;
    }
    let deleted = delete_by_ids(&tx, table, ids)?;
    tx.commit()?;

    log::info!("Deleted {} rows from {}", deleted, table);
    Ok(deleted)
}

/// Id of a row submitted for update
pub(crate) fn require_id(id: Option<i64>, entity: &str) -> Result<i64> {
    id.ok_or_else(|| SapError::Validation(format!("{} id is required for update", entity)).into())
}

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    #[test]
    fn test_id_list() {
        assert_eq!(id_list(1), "SELECT value FROM rarray(?1)");
        assert_eq!(id_list(3), "SELECT value FROM rarray(?3)");
    }

    #[test]
    fn test_ensure_ids_exist() {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute("INSERT INTO lots (id, name) VALUES (1, 'A'), (2, 'B')", [])
            .unwrap();

        assert!(ensure_ids_exist(&conn, "lots", &[1, 2], "missing lot").is_ok());
        let err = ensure_ids_exist(&conn, "lots", &[1, 3], "missing lot").unwrap_err();
        assert_eq!(
            err.downcast_ref::<SapError>(),
            Some(&SapError::Validation("missing lot".into()))
        );
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        // Count comparison: a repeated id matches one row, so the request falls short
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute("INSERT INTO lots (id, name) VALUES (1, 'A'), (2, 'B')", [])
            .unwrap();
        assert!(ensure_ids_exist(&conn, "lots", &[1, 1], "missing lot").is_err());
        assert!(ensure_ids_exist(&conn, "lots", &[1, 2, 2], "missing lot").is_err());
    }

    #[test]
    fn test_id_batches_beyond_parameter_limit() {
        let conn = DbConnection::connect_in_memory().unwrap();
        {
            let tx = conn.unchecked_transaction().unwrap();
            let mut stmt = tx.prepare("INSERT INTO lots (id, name) VALUES (?1, 'lot')").unwrap();
            for id in 1..=40_000i64 {
                stmt.execute([id]).unwrap();
            }
            drop(stmt);
            tx.commit().unwrap();
        }
        let ids: Vec<i64> = (1..=40_000).collect();

        assert!(ensure_ids_exist(&conn, "lots", &ids, "missing lot").is_ok());
        assert_eq!(delete_by_ids(&conn, "lots", &ids).unwrap(), 40_000);
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(Some(4), "Style").unwrap(), 4);
        let err = require_id(None, "Style").unwrap_err();
        assert_eq!(err.to_string(), "Style id is required for update");
    }
}
