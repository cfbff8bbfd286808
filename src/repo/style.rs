use rusqlite::Connection;
use crate::actor::Actor;
use crate::models::LayerStyle;
use super::{ensure_ids_exist, guarded_delete, now_ts, require_id};
use anyhow::{Context, Result};

/// Layer style repository
pub struct StyleRepo;

impl StyleRepo {
    pub fn list(conn: &Connection) -> Result<Vec<LayerStyle>> {
        let mut stmt = conn.prepare(
            "SELECT id, f_table_schema, f_table_name, f_geometry_column, stylename,
                    styleqml, stylesld, ui, owner, updated_ts
             FROM layer_styles ORDER BY stylename, f_table_schema, f_table_name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LayerStyle {
                id: row.get(0)?,
                f_table_schema: row.get(1)?,
                f_table_name: row.get(2)?,
                f_geometry_column: row.get(3)?,
                stylename: row.get(4)?,
                styleqml: row.get(5)?,
                stylesld: row.get(6)?,
                ui: row.get(7)?,
                owner: row.get(8)?,
                updated_ts: row.get(9)?,
            })
        })?;

        let mut styles = Vec::new();
        for row in rows {
            styles.push(row?);
        }
        Ok(styles)
    }

    /// Distinct style names
    pub fn list_names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT stylename FROM layer_styles ORDER BY stylename")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Insert styles owned by `actor`
    pub fn create(conn: &Connection, styles: &[LayerStyle], actor: &Actor) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        let mut ids = Vec::with_capacity(styles.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO layer_styles
                    (f_table_schema, f_table_name, f_geometry_column, stylename,
                     styleqml, stylesld, ui, owner, updated_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            )?;
            for style in styles {
                stmt.execute(rusqlite::params![
                    style.f_table_schema,
                    style.f_table_name,
                    style.f_geometry_column,
                    style.stylename,
                    style.styleqml,
                    style.stylesld,
                    style.ui,
                    actor.display_name,
                    now,
                ])
                .with_context(|| format!(
                    "Failed to create style '{}' for {}.{}",
                    style.stylename, style.f_table_schema, style.f_table_name
                ))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Replace styles by id, re-stamping owner and update time
    pub fn update(conn: &Connection, styles: &[LayerStyle], actor: &Actor) -> Result<()> {
        let ids = styles
            .iter()
            .map(|s| require_id(s.id, "Style"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "layer_styles", &ids, "The request contains styles that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        {
            let mut stmt = tx.prepare(
                "UPDATE layer_styles SET
                    f_table_schema = ?1, f_table_name = ?2, f_geometry_column = ?3, stylename = ?4,
                    styleqml = ?5, stylesld = ?6, ui = ?7, owner = ?8, updated_ts = ?9
                 WHERE id = ?10"
            )?;
            for (style, id) in styles.iter().zip(&ids) {
                stmt.execute(rusqlite::params![
                    style.f_table_schema,
                    style.f_table_name,
                    style.f_geometry_column,
                    style.stylename,
                    style.styleqml,
                    style.stylesld,
                    style.ui,
                    actor.display_name,
                    now,
                    id,
                ])
                .with_context(|| format!("Failed to update style {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "layer_styles", ids, "The request contains styles that do not exist", &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::error::SapError;

    fn style(name: &str, table: &str) -> LayerStyle {
        LayerStyle {
            id: None,
            f_table_schema: "edgv".into(),
            f_table_name: table.into(),
            f_geometry_column: "geom".into(),
            stylename: name.into(),
            styleqml: Some("<qgis/>".into()),
            stylesld: None,
            ui: None,
            owner: None,
            updated_ts: None,
        }
    }

    #[test]
    fn test_create_stamps_owner() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let actor = Actor::new(1, "Sgt Silva");
        StyleRepo::create(&conn, &[style("night", "hid_trecho_drenagem_l"), style("night", "tra_via_l")], &actor)
            .unwrap();

        let styles = StyleRepo::list(&conn).unwrap();
        assert_eq!(styles.len(), 2);
        assert!(styles.iter().all(|s| s.owner.as_deref() == Some("Sgt Silva")));
        assert!(styles.iter().all(|s| s.updated_ts.is_some()));
        assert_eq!(StyleRepo::list_names(&conn).unwrap(), vec!["night".to_string()]);
    }

    #[test]
    fn test_update_restamps_owner() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ids = StyleRepo::create(&conn, &[style("day", "tra_via_l")], &Actor::new(1, "Sgt Silva")).unwrap();

        let mut changed = style("day-v2", "tra_via_l");
        changed.id = Some(ids[0]);
        StyleRepo::update(&conn, &[changed], &Actor::new(2, "Cap Souza")).unwrap();

        let stored = &StyleRepo::list(&conn).unwrap()[0];
        assert_eq!(stored.stylename, "day-v2");
        assert_eq!(stored.owner.as_deref(), Some("Cap Souza"));
    }

    #[test]
    fn test_update_and_delete_require_existing_ids() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let mut ghost = style("x", "t");
        ghost.id = Some(77);
        let err = StyleRepo::update(&conn, &[ghost], &Actor::new(1, "A")).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::Validation(_))));

        assert!(StyleRepo::update(&conn, &[style("x", "t")], &Actor::new(1, "A")).is_err());
        assert!(StyleRepo::delete(&conn, &[77]).is_err());
    }
}
