use rusqlite::Connection;
use crate::error::SapError;
use crate::models::{
    DatabaseEndpoint, Lot, Phase, Product, ProductionData, ProductionLine, Project, SubPhase,
};
use crate::spatial;
use super::ensure_ids_exist;
use anyhow::{Context, Result};

/// Production structure repository: projects down to subphases, plus lots,
/// production data sources and products
pub struct ProductionRepo;

/// Production data types whose configuration is a `server:port` pair
const DATABASE_TYPES: [i64; 2] = [2, 3];

impl ProductionRepo {
    pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
        let mut stmt = conn.prepare("SELECT id, name, finished FROM projects ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                finished: row.get::<_, i64>(2)? != 0,
            })
        })?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    pub fn list_production_lines(conn: &Connection) -> Result<Vec<ProductionLine>> {
        let mut stmt = conn.prepare(
            "SELECT pl.id, pl.name, pl.project_id, p.name, p.finished, pl.product_type
             FROM production_lines AS pl
             INNER JOIN projects AS p ON p.id = pl.project_id
             ORDER BY p.name, pl.name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductionLine {
                id: row.get(0)?,
                name: row.get(1)?,
                project_id: row.get(2)?,
                project: row.get(3)?,
                finished: row.get::<_, i64>(4)? != 0,
                product_type: row.get(5)?,
            })
        })?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    pub fn list_phases(conn: &Connection) -> Result<Vec<Phase>> {
        let mut stmt = conn.prepare(
            "SELECT ph.id, ph.phase_type, ph.production_line_id, pl.name, ph.ordem, p.name, p.finished
             FROM phases AS ph
             INNER JOIN production_lines AS pl ON pl.id = ph.production_line_id
             INNER JOIN projects AS p ON p.id = pl.project_id
             ORDER BY ph.production_line_id, ph.ordem"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Phase {
                id: row.get(0)?,
                phase_type: row.get(1)?,
                production_line_id: row.get(2)?,
                production_line: row.get(3)?,
                ordem: row.get(4)?,
                project: row.get(5)?,
                finished: row.get::<_, i64>(6)? != 0,
            })
        })?;

        let mut phases = Vec::new();
        for row in rows {
            phases.push(row?);
        }
        Ok(phases)
    }

    pub fn list_subphases(conn: &Connection) -> Result<Vec<SubPhase>> {
        let mut stmt = conn.prepare(
            "SELECT sp.id, sp.name, sp.phase_id, ph.phase_type, sp.ordem, sp.note, pl.name, p.name
             FROM subphases AS sp
             INNER JOIN phases AS ph ON ph.id = sp.phase_id
             INNER JOIN production_lines AS pl ON pl.id = ph.production_line_id
             INNER JOIN projects AS p ON p.id = pl.project_id
             ORDER BY ph.production_line_id, ph.ordem, sp.ordem"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubPhase {
                id: row.get(0)?,
                name: row.get(1)?,
                phase_id: row.get(2)?,
                phase_type: row.get(3)?,
                ordem: row.get(4)?,
                note: row.get(5)?,
                production_line: row.get(6)?,
                project: row.get(7)?,
            })
        })?;

        let mut subphases = Vec::new();
        for row in rows {
            subphases.push(row?);
        }
        Ok(subphases)
    }

    pub fn list_lots(conn: &Connection) -> Result<Vec<Lot>> {
        let mut stmt = conn.prepare("SELECT id, name FROM lots ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Lot {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(row?);
        }
        Ok(lots)
    }

    pub fn list_production_data(conn: &Connection) -> Result<Vec<ProductionData>> {
        let mut stmt = conn.prepare(
            "SELECT pd.id, pd.name, pd.data_type, t.name, pd.production_config
             FROM production_data AS pd
             INNER JOIN production_data_types AS t ON t.code = pd.data_type
             ORDER BY pd.name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductionData {
                id: row.get(0)?,
                name: row.get(1)?,
                data_type_id: row.get(2)?,
                data_type: row.get(3)?,
                production_config: row.get(4)?,
            })
        })?;

        let mut data = Vec::new();
        for row in rows {
            data.push(row?);
        }
        Ok(data)
    }

    /// Production databases, with the `server:port` configuration split apart
    pub fn list_databases(conn: &Connection) -> Result<Vec<DatabaseEndpoint>> {
        let data = Self::list_production_data(conn)?;
        Ok(data
            .into_iter()
            .filter(|d| DATABASE_TYPES.contains(&d.data_type_id))
            .filter_map(|d| {
                let config = d.production_config?;
                Some(DatabaseEndpoint::from_config(d.name, &config))
            })
            .collect())
    }

    /// Bulk-insert products of a production line
    ///
    /// Geometries must be valid (E)WKT; a uuid is generated for products
    /// submitted without one. Returns the new ids in input order.
    pub fn create_products(conn: &Connection, products: &[Product], production_line_id: i64) -> Result<Vec<i64>> {
        ensure_ids_exist(
            conn,
            "production_lines",
            &[production_line_id],
            "Production line not found",
        )?;
        for product in products {
            spatial::parse_ewkt(&product.geom).map_err(|e| {
                SapError::Validation(format!(
                    "Invalid geometry for product '{}': {}",
                    product.name.as_deref().unwrap_or_default(),
                    e
                ))
            })?;
        }

        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(products.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (uuid, name, mi, inom, scale, production_line_id, geom)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            )?;
            for product in products {
                let uuid = product
                    .uuid
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                stmt.execute(rusqlite::params![
                    uuid,
                    product.name,
                    product.mi,
                    product.inom,
                    product.scale,
                    production_line_id,
                    product.geom,
                ])
                .with_context(|| format!("Failed to insert product {}", uuid))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        log::info!("Created {} products in production line {}", ids.len(), production_line_id);
        Ok(ids)
    }

    pub fn list_products(conn: &Connection, production_line_id: i64) -> Result<Vec<Product>> {
        let mut stmt = conn.prepare(
            "SELECT id, uuid, name, mi, inom, scale, geom FROM products
             WHERE production_line_id = ?1 ORDER BY id"
        )?;
        let rows = stmt.query_map([production_line_id], |row| {
            Ok(Product {
                id: row.get(0)?,
                uuid: row.get(1)?,
                name: row.get(2)?,
                mi: row.get(3)?,
                inom: row.get(4)?,
                scale: row.get(5)?,
                geom: row.get(6)?,
            })
        })?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    fn setup() -> Connection {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO projects (id, name, finished) VALUES (1, 'Rio Doce', 0), (2, 'Archive', 1);
             INSERT INTO production_lines (id, name, project_id, product_type) VALUES (1, 'Topographic 1:25k', 1, 'Map');
             INSERT INTO phases (id, phase_type, production_line_id, ordem) VALUES
                (1, 'Editing', 1, 2), (2, 'Vectorization', 1, 1);
             INSERT INTO subphases (id, name, phase_id, ordem) VALUES (1, 'Hydrography', 2, 1);
             INSERT INTO production_data (id, name, data_type, production_config) VALUES
                (1, 'shapefiles', 1, '/data/shp'),
                (2, 'bdgex_25k', 2, '10.0.0.5:5432'),
                (3, 'service', 3, 'db.local:5433');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_structure_listings() {
        let conn = setup();
        assert_eq!(ProductionRepo::list_projects(&conn).unwrap().len(), 2);

        let phases = ProductionRepo::list_phases(&conn).unwrap();
        assert_eq!(phases[0].phase_type, "Vectorization");
        assert_eq!(phases[0].production_line, "Topographic 1:25k");

        let subphases = ProductionRepo::list_subphases(&conn).unwrap();
        assert_eq!(subphases.len(), 1);
        assert_eq!(subphases[0].project, "Rio Doce");
    }

    #[test]
    fn test_list_databases_splits_config() {
        let conn = setup();
        let databases = ProductionRepo::list_databases(&conn).unwrap();
        assert_eq!(
            databases,
            vec![
                DatabaseEndpoint {
                    name: "bdgex_25k".into(),
                    server: "10.0.0.5".into(),
                    port: Some("5432".into()),
                },
                DatabaseEndpoint {
                    name: "service".into(),
                    server: "db.local".into(),
                    port: Some("5433".into()),
                },
            ]
        );
    }

    #[test]
    fn test_create_products_generates_uuid() {
        let conn = setup();
        let product = Product {
            id: None,
            uuid: None,
            name: Some("Folha 1".into()),
            mi: Some("2965-2".into()),
            inom: Some("SF-23-Y-A-II-2".into()),
            scale: "25k".into(),
            geom: "SRID=4674;POLYGON((0 0,1 0,1 1,0 1,0 0))".into(),
        };
        let ids = ProductionRepo::create_products(&conn, &[product], 1).unwrap();
        assert_eq!(ids.len(), 1);

        let stored = ProductionRepo::list_products(&conn, 1).unwrap();
        let generated = stored[0].uuid.as_deref().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[test]
    fn test_create_products_validation() {
        let conn = setup();
        let product = Product {
            id: None,
            uuid: None,
            name: None,
            mi: None,
            inom: None,
            scale: "25k".into(),
            geom: "not wkt".into(),
        };
        let err = ProductionRepo::create_products(&conn, &[product.clone()], 1).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::Validation(_))));

        let err = ProductionRepo::create_products(&conn, &[product], 42).unwrap_err();
        assert!(err.to_string().contains("Production line not found"));
    }
}
