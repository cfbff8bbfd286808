use rusqlite::Connection;
use crate::error::SapError;
use crate::models::{Input, InputBinding, InputGroup, StrategyInfo};
use crate::spatial;
use anyhow::{Context, Result};

/// Input (insumo) repository
pub struct InputRepo;

impl InputRepo {
    /// Input groups by name
    pub fn list_groups(conn: &Connection) -> Result<Vec<InputGroup>> {
        let mut stmt = conn.prepare("SELECT id, name FROM input_groups ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(InputGroup {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    pub fn create_group(conn: &Connection, name: &str) -> Result<InputGroup> {
        conn.execute("INSERT INTO input_groups (name) VALUES (?1)", [name])
            .with_context(|| format!("Failed to create input group '{}'", name))?;
        Ok(InputGroup {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Bulk-insert inputs; geometries, when present, must be valid (E)WKT
    pub fn create_many(conn: &Connection, inputs: &[Input]) -> Result<Vec<i64>> {
        for input in inputs {
            if let Some(geom) = &input.geom {
                spatial::parse_ewkt(geom).map_err(|e| {
                    SapError::Validation(format!("Invalid geometry for input '{}': {}", input.name, e))
                })?;
            }
        }

        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(inputs.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO inputs (name, path, epsg, geom, input_group_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            )?;
            for input in inputs {
                stmt.execute(rusqlite::params![
                    input.name,
                    input.path,
                    input.epsg,
                    input.geom,
                    input.input_group_id,
                ])
                .with_context(|| format!("Failed to insert input '{}'", input.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Input bindings of a work unit
    pub fn list_bindings(conn: &Connection, work_unit_id: i64) -> Result<Vec<InputBinding>> {
        let mut stmt = conn.prepare(
            "SELECT id, work_unit_id, input_id, default_path FROM input_bindings
             WHERE work_unit_id = ?1 ORDER BY input_id, id"
        )?;
        let rows = stmt.query_map([work_unit_id], |row| {
            Ok(InputBinding {
                id: row.get(0)?,
                work_unit_id: row.get(1)?,
                input_id: row.get(2)?,
                default_path: row.get(3)?,
            })
        })?;

        let mut bindings = Vec::new();
        for row in rows {
            bindings.push(row?);
        }
        Ok(bindings)
    }

    /// Re-create every binding of `source_id` on `target_id`, returning the count
    pub fn copy_bindings(conn: &Connection, source_id: i64, target_id: i64) -> Result<usize> {
        conn.execute(
            "INSERT INTO input_bindings (work_unit_id, input_id, default_path)
             SELECT ?2, input_id, default_path FROM input_bindings WHERE work_unit_id = ?1",
            rusqlite::params![source_id, target_id],
        )
        .with_context(|| format!(
            "Failed to copy input bindings from work unit {} to {}",
            source_id, target_id
        ))
    }

    /// Seeded association strategies, by code
    pub fn list_strategies(conn: &Connection) -> Result<Vec<StrategyInfo>> {
        let mut stmt = conn.prepare("SELECT code, name FROM association_strategies ORDER BY code")?;
        let rows = stmt.query_map([], |row| {
            Ok(StrategyInfo {
                code: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut strategies = Vec::new();
        for row in rows {
            strategies.push(row?);
        }
        Ok(strategies)
    }
}
