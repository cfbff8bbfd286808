use rusqlite::Connection;
use crate::models::Layer;
use super::{ensure_ids_exist, guarded_delete, require_id};
use anyhow::{Context, Result};

/// Layer (camada) repository
pub struct LayerRepo;

impl LayerRepo {
    /// Layers, flagged with whether they have attributes and profiles
    pub fn list(conn: &Connection) -> Result<Vec<Layer>> {
        let mut stmt = conn.prepare(
            "SELECT l.id, l.schema_name, l.name, l.alias, l.documentation,
                    EXISTS(SELECT 1 FROM layer_attributes AS a WHERE a.layer_id = l.id),
                    EXISTS(SELECT 1 FROM layer_profiles AS p WHERE p.layer_id = l.id)
             FROM layers AS l
             ORDER BY l.schema_name, l.name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Layer {
                id: row.get(0)?,
                schema_name: row.get(1)?,
                name: row.get(2)?,
                alias: row.get(3)?,
                documentation: row.get(4)?,
                has_attributes: row.get(5)?,
                has_profile: row.get(6)?,
            })
        })?;

        let mut layers = Vec::new();
        for row in rows {
            layers.push(row?);
        }
        Ok(layers)
    }

    pub fn create(conn: &Connection, layers: &[Layer]) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(layers.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO layers (schema_name, name, alias, documentation) VALUES (?1, ?2, ?3, ?4)"
            )?;
            for layer in layers {
                stmt.execute(rusqlite::params![
                    layer.schema_name,
                    layer.name,
                    layer.alias,
                    layer.documentation,
                ])
                .with_context(|| format!("Failed to create layer {}.{}", layer.schema_name, layer.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Update alias and documentation; schema and name are immutable
    pub fn update(conn: &Connection, layers: &[Layer]) -> Result<()> {
        let ids = layers
            .iter()
            .map(|l| require_id(l.id, "Layer"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "layers", &ids, "The request contains layers that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE layers SET alias = ?1, documentation = ?2 WHERE id = ?3"
            )?;
            for (layer, id) in layers.iter().zip(&ids) {
                stmt.execute(rusqlite::params![layer.alias, layer.documentation, id])
                    .with_context(|| format!("Failed to update layer {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete layers with no attributes and no layer profiles
    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(
            conn,
            "layers",
            ids,
            "The request contains layers that do not exist",
            &[
                ("layer_attributes", "layer_id", "Layers with attributes cannot be deleted"),
                ("layer_profiles", "layer_id", "Layers used by layer profiles cannot be deleted"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::error::SapError;

    fn layer(name: &str) -> Layer {
        Layer {
            id: None,
            schema_name: "edgv".into(),
            name: name.into(),
            alias: None,
            documentation: None,
            has_attributes: false,
            has_profile: false,
        }
    }

    #[test]
    fn test_list_flags() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ids = LayerRepo::create(&conn, &[layer("hid_trecho_drenagem_l"), layer("tra_via_l")]).unwrap();
        conn.execute(
            "INSERT INTO layer_attributes (layer_id, name) VALUES (?1, 'regime')",
            [ids[0]],
        )
        .unwrap();

        let layers = LayerRepo::list(&conn).unwrap();
        assert!(layers[0].has_attributes);
        assert!(!layers[0].has_profile);
        assert!(!layers[1].has_attributes);
    }

    #[test]
    fn test_update_alias_only() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ids = LayerRepo::create(&conn, &[layer("tra_via_l")]).unwrap();
        let mut changed = layer("ignored");
        changed.id = Some(ids[0]);
        changed.alias = Some("Roads".into());
        LayerRepo::update(&conn, &[changed]).unwrap();

        let stored = &LayerRepo::list(&conn).unwrap()[0];
        assert_eq!(stored.name, "tra_via_l");
        assert_eq!(stored.alias.as_deref(), Some("Roads"));
    }

    #[test]
    fn test_delete_guarded_by_attributes() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ids = LayerRepo::create(&conn, &[layer("tra_via_l")]).unwrap();
        conn.execute("INSERT INTO layer_attributes (layer_id, name) VALUES (?1, 'tipo')", [ids[0]])
            .unwrap();

        let err = LayerRepo::delete(&conn, &ids).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::Conflict(_))));

        conn.execute("DELETE FROM layer_attributes", []).unwrap();
        assert_eq!(LayerRepo::delete(&conn, &ids).unwrap(), 1);
    }
}
