use rusqlite::Connection;
use crate::actor::Actor;
use crate::models::{QgisMenu, QgisModel};
use super::{ensure_ids_exist, guarded_delete, now_ts, require_id};
use anyhow::{Context, Result};

/// QGIS processing model repository
pub struct QgisModelRepo;

/// QGIS menu repository
pub struct QgisMenuRepo;

impl QgisModelRepo {
    pub fn list(conn: &Connection) -> Result<Vec<QgisModel>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, model_xml, owner, updated_ts FROM qgis_models ORDER BY name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QgisModel {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                model_xml: row.get(3)?,
                owner: row.get(4)?,
                updated_ts: row.get(5)?,
            })
        })?;

        let mut models = Vec::new();
        for row in rows {
            models.push(row?);
        }
        Ok(models)
    }

    pub fn create(conn: &Connection, models: &[QgisModel], actor: &Actor) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        let mut ids = Vec::with_capacity(models.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO qgis_models (name, description, model_xml, owner, updated_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            )?;
            for model in models {
                stmt.execute(rusqlite::params![
                    model.name,
                    model.description,
                    model.model_xml,
                    actor.display_name,
                    now,
                ])
                .with_context(|| format!("Failed to create QGIS model '{}'", model.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, models: &[QgisModel], actor: &Actor) -> Result<()> {
        let ids = models
            .iter()
            .map(|m| require_id(m.id, "Model"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "qgis_models", &ids, "The request contains models that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        {
            let mut stmt = tx.prepare(
                "UPDATE qgis_models SET name = ?1, description = ?2, model_xml = ?3,
                    owner = ?4, updated_ts = ?5
                 WHERE id = ?6"
            )?;
            for (model, id) in models.iter().zip(&ids) {
                stmt.execute(rusqlite::params![
                    model.name,
                    model.description,
                    model.model_xml,
                    actor.display_name,
                    now,
                    id,
                ])
                .with_context(|| format!("Failed to update QGIS model {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete models no model profile uses
    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(
            conn,
            "qgis_models",
            ids,
            "The request contains models that do not exist",
            &[("model_profiles", "qgis_model_id", "Models referenced by model profiles cannot be deleted")],
        )
    }
}

impl QgisMenuRepo {
    pub fn list(conn: &Connection) -> Result<Vec<QgisMenu>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, definition, owner, updated_ts FROM qgis_menus ORDER BY name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QgisMenu {
                id: row.get(0)?,
                name: row.get(1)?,
                definition: row.get(2)?,
                owner: row.get(3)?,
                updated_ts: row.get(4)?,
            })
        })?;

        let mut menus = Vec::new();
        for row in rows {
            menus.push(row?);
        }
        Ok(menus)
    }

    pub fn create(conn: &Connection, menus: &[QgisMenu], actor: &Actor) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        let mut ids = Vec::with_capacity(menus.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO qgis_menus (name, definition, owner, updated_ts) VALUES (?1, ?2, ?3, ?4)"
            )?;
            for menu in menus {
                stmt.execute(rusqlite::params![menu.name, menu.definition, actor.display_name, now])
                    .with_context(|| format!("Failed to create menu '{}'", menu.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, menus: &[QgisMenu], actor: &Actor) -> Result<()> {
        let ids = menus
            .iter()
            .map(|m| require_id(m.id, "Menu"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "qgis_menus", &ids, "The request contains menus that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        {
            let mut stmt = tx.prepare(
                "UPDATE qgis_menus SET name = ?1, definition = ?2, owner = ?3, updated_ts = ?4
                 WHERE id = ?5"
            )?;
            for (menu, id) in menus.iter().zip(&ids) {
                stmt.execute(rusqlite::params![menu.name, menu.definition, actor.display_name, now, id])
                    .with_context(|| format!("Failed to update menu {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "qgis_menus", ids, "The request contains menus that do not exist", &[])
    }
}
