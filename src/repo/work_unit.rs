use rusqlite::{Connection, OptionalExtension};
use crate::error::SapError;
use crate::models::{ActivityStatus, WorkUnit};
use crate::spatial;
use super::{ensure_ids_exist, id_list, with_ids};
use anyhow::{Context, Result};

/// Work unit (unidade de trabalho) repository
pub struct WorkUnitRepo;

const COLUMNS: &str =
    "id, name, geom, epsg, production_data_id, subphase_id, lot_id, available, priority, note";

impl WorkUnitRepo {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkUnit> {
        Ok(WorkUnit {
            id: row.get(0)?,
            name: row.get(1)?,
            geom: row.get(2)?,
            epsg: row.get(3)?,
            production_data_id: row.get(4)?,
            subphase_id: row.get(5)?,
            lot_id: row.get(6)?,
            available: row.get::<_, i64>(7)? != 0,
            priority: row.get(8)?,
            note: row.get(9)?,
        })
    }

    /// Bulk-insert work units into a subphase
    ///
    /// Every geometry is parsed (WKT or EWKT) before anything is written; the
    /// EPSG code defaults to the EWKT SRID. Returns the new ids in input order.
    pub fn create_many(conn: &Connection, units: &[WorkUnit], subphase_id: i64) -> Result<Vec<i64>> {
        let mut epsgs = Vec::with_capacity(units.len());
        for unit in units {
            let parsed = spatial::parse_ewkt(&unit.geom).map_err(|e| {
                SapError::Validation(format!("Invalid geometry for work unit '{}': {}", unit.name, e))
            })?;
            epsgs.push(unit.epsg.or(parsed.srid.map(i64::from)));
        }

        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(units.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO work_units
                    (name, geom, epsg, production_data_id, subphase_id, lot_id, available, priority, note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            )?;
            for (unit, epsg) in units.iter().zip(epsgs) {
                stmt.execute(rusqlite::params![
                    unit.name,
                    unit.geom,
                    epsg,
                    unit.production_data_id,
                    subphase_id,
                    unit.lot_id,
                    unit.available,
                    unit.priority,
                    unit.note,
                ])
                .with_context(|| format!("Failed to insert work unit '{}'", unit.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        log::info!("Created {} work units in subphase {}", ids.len(), subphase_id);
        Ok(ids)
    }

    /// Get work unit by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<WorkUnit>> {
        conn.query_row(
            &format!("SELECT {} FROM work_units WHERE id = ?1", COLUMNS),
            [id],
            Self::from_row,
        )
        .optional()
        .with_context(|| format!("Failed to query work unit {}", id))
    }

    /// Work units of a subphase
    pub fn list_by_subphase(conn: &Connection, subphase_id: i64) -> Result<Vec<WorkUnit>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM work_units WHERE subphase_id = ?1 ORDER BY id",
            COLUMNS
        ))?;
        let rows = stmt.query_map([subphase_id], Self::from_row)?;

        let mut units = Vec::new();
        for row in rows {
            units.push(row?);
        }
        Ok(units)
    }

    /// Move work units to a lot, returning the number of rows updated
    pub fn set_lot(conn: &Connection, work_unit_ids: &[i64], lot_id: i64) -> Result<usize> {
        ensure_ids_exist(conn, "lots", &[lot_id], "Lot not found")?;
        let sql = format!(
            "UPDATE work_units SET lot_id = ?1 WHERE id IN ({})",
            id_list(2)
        );
        let updated = conn
            .execute(&sql, with_ids(&[&lot_id], work_unit_ids))
            .with_context(|| format!("Failed to move work units to lot {}", lot_id))?;
        log::info!("Moved {} work units to lot {}", updated, lot_id);
        Ok(updated)
    }

    /// Delete work units with their input bindings and activities
    ///
    /// Fails with a conflict, leaving everything in place, when any unit has an
    /// activity past not-started.
    pub fn delete(conn: &Connection, work_unit_ids: &[i64]) -> Result<usize> {
        ensure_ids_exist(
            conn,
            "work_units",
            work_unit_ids,
            "The request contains work units that do not exist",
        )?;

        let tx = conn.unchecked_transaction()?;

        let in_ids = id_list(2);
        let not_started = ActivityStatus::NotStarted.code();
        let started: bool = tx.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM activities WHERE status != ?1 AND work_unit_id IN ({}))",
                in_ids
            ),
            with_ids(&[&not_started], work_unit_ids),
            |row| row.get(0),
        )?;
        if started {
            log::warn!("Refusing to delete work units {:?}: activities already started", work_unit_ids);
            return Err(SapError::Conflict(
                "Work units that already have started activities cannot be deleted".to_string(),
            )
            .into());
        }

        let by_unit = id_list(1);
        tx.execute(
            &format!("DELETE FROM input_bindings WHERE work_unit_id IN ({})", by_unit),
            with_ids(&[], work_unit_ids),
        )
        .context("Failed to delete input bindings of work units")?;
        tx.execute(
            &format!("DELETE FROM activities WHERE work_unit_id IN ({})", by_unit),
            with_ids(&[], work_unit_ids),
        )
        .context("Failed to delete activities of work units")?;
        let deleted = tx
            .execute(
                &format!("DELETE FROM work_units WHERE id IN ({})", by_unit),
                with_ids(&[], work_unit_ids),
            )
            .context("Failed to delete work units")?;

        tx.commit()?;
        log::info!("Deleted {} work units", deleted);
        Ok(deleted)
    }

    /// Clone a work unit into another subphase, returning the clone's id
    ///
    /// Copies name, geometry, EPSG, production data, lot, availability and
    /// priority; the note stays behind. `None` when the source does not exist.
    pub fn copy_into(conn: &Connection, source_id: i64, subphase_id: i64) -> Result<Option<i64>> {
        let inserted = conn
            .execute(
                "INSERT INTO work_units
                    (name, geom, epsg, production_data_id, subphase_id, lot_id, available, priority)
                 SELECT name, geom, epsg, production_data_id, ?2, lot_id, available, priority
                 FROM work_units WHERE id = ?1",
                rusqlite::params![source_id, subphase_id],
            )
            .with_context(|| format!("Failed to copy work unit {}", source_id))?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }
}
