use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version = Self::get_version(conn)?;

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::info!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: production structure, pipeline and inputs
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    // Users (identity lookup for owner stamping)
    tx.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            nickname TEXT NOT NULL,
            rank_abbrev TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // Production structure: project > production line > phase > subphase
    tx.execute(
        "CREATE TABLE projects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            finished INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE production_lines (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            project_id INTEGER NOT NULL REFERENCES projects(id),
            product_type TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE phases (
            id INTEGER PRIMARY KEY,
            phase_type TEXT NOT NULL,
            production_line_id INTEGER NOT NULL REFERENCES production_lines(id),
            ordem INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE subphases (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            phase_id INTEGER NOT NULL REFERENCES phases(id),
            ordem INTEGER NOT NULL,
            note TEXT NULL
        )",
        [],
    )?;

    // Stage pipeline
    tx.execute(
        "CREATE TABLE stage_kinds (
            code INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "INSERT INTO stage_kinds (code, name) VALUES
            (1, 'Execution'), (2, 'Review'), (3, 'Correction'), (4, 'Review/Correction')",
        [],
    )?;
    tx.execute(
        "CREATE TABLE stages (
            id INTEGER PRIMARY KEY,
            kind INTEGER NOT NULL REFERENCES stage_kinds(code),
            subphase_id INTEGER NOT NULL REFERENCES subphases(id),
            ordem INTEGER NOT NULL,
            note TEXT NULL,
            UNIQUE(subphase_id, ordem)
        )",
        [],
    )?;
    // Note: UNIQUE(subphase_id, ordem) turns a lost max-ordem race into a constraint
    // failure (and a rolled back transaction) instead of a duplicated position.

    // Lots and production data sources
    tx.execute(
        "CREATE TABLE lots (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE production_data_types (
            code INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "INSERT INTO production_data_types (code, name) VALUES
            (1, 'Files'), (2, 'PostGIS'), (3, 'PostGIS service')",
        [],
    )?;
    tx.execute(
        "CREATE TABLE production_data (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            data_type INTEGER NOT NULL REFERENCES production_data_types(code),
            production_config TEXT NULL
        )",
        [],
    )?;
    // Note: for database types production_config holds 'server:port'

    // Work units
    tx.execute(
        "CREATE TABLE work_units (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            geom TEXT NOT NULL,
            epsg INTEGER NULL,
            production_data_id INTEGER NULL REFERENCES production_data(id),
            subphase_id INTEGER NOT NULL REFERENCES subphases(id),
            lot_id INTEGER NULL REFERENCES lots(id),
            available INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 0,
            note TEXT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_work_units_subphase ON work_units(subphase_id)",
        [],
    )?;

    // Activities
    tx.execute(
        "CREATE TABLE activity_statuses (
            code INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "INSERT INTO activity_statuses (code, name) VALUES
            (1, 'Not started'), (2, 'Running'), (3, 'Paused'), (4, 'Finished'), (5, 'Canceled')",
        [],
    )?;
    tx.execute(
        "CREATE TABLE activities (
            id INTEGER PRIMARY KEY,
            stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
            work_unit_id INTEGER NOT NULL REFERENCES work_units(id),
            status INTEGER NOT NULL REFERENCES activity_statuses(code)
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_activities_unit_stage ON activities(work_unit_id, stage_id)",
        [],
    )?;
    // Note: at most one non-canceled activity per (unit, stage) is enforced by the
    // creation queries, not by a constraint (canceled rows may repeat).

    // Inputs
    tx.execute(
        "CREATE TABLE input_groups (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE inputs (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            epsg INTEGER NULL,
            geom TEXT NULL,
            input_group_id INTEGER NOT NULL REFERENCES input_groups(id)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE input_bindings (
            id INTEGER PRIMARY KEY,
            work_unit_id INTEGER NOT NULL REFERENCES work_units(id),
            input_id INTEGER NOT NULL REFERENCES inputs(id),
            default_path TEXT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_input_bindings_unit ON input_bindings(work_unit_id)",
        [],
    )?;
    tx.execute(
        "CREATE TABLE association_strategies (
            code INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "INSERT INTO association_strategies (code, name) VALUES
            (1, 'Work unit centroid contained in the input'),
            (2, 'Input centroid contained in the work unit'),
            (3, 'Intersection between input and work unit'),
            (4, 'Overlap between input and work unit'),
            (5, 'Associate input with every work unit')",
        [],
    )?;

    // Products
    tx.execute(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NULL,
            mi TEXT NULL,
            inom TEXT NULL,
            scale TEXT NOT NULL,
            production_line_id INTEGER NOT NULL REFERENCES production_lines(id),
            geom TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Migration v2: QGIS catalog, FME registry and per-subphase profiles
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE layer_styles (
            id INTEGER PRIMARY KEY,
            f_table_schema TEXT NOT NULL,
            f_table_name TEXT NOT NULL,
            f_geometry_column TEXT NOT NULL,
            stylename TEXT NOT NULL,
            styleqml TEXT NULL,
            stylesld TEXT NULL,
            ui TEXT NULL,
            owner TEXT NOT NULL,
            updated_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE rule_groups (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            color_rgb TEXT NOT NULL,
            ordem INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE layer_rules (
            id INTEGER PRIMARY KEY,
            rule_group_id INTEGER NOT NULL REFERENCES rule_groups(id),
            schema_name TEXT NOT NULL,
            layer TEXT NOT NULL,
            attribute TEXT NOT NULL,
            rule TEXT NOT NULL,
            description TEXT NULL,
            owner TEXT NOT NULL,
            updated_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE qgis_models (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NULL,
            model_xml TEXT NOT NULL,
            owner TEXT NOT NULL,
            updated_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE qgis_menus (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            definition TEXT NOT NULL,
            owner TEXT NOT NULL,
            updated_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE layers (
            id INTEGER PRIMARY KEY,
            schema_name TEXT NOT NULL,
            name TEXT NOT NULL,
            alias TEXT NULL,
            documentation TEXT NULL,
            UNIQUE(schema_name, name)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE layer_attributes (
            id INTEGER PRIMARY KEY,
            layer_id INTEGER NOT NULL REFERENCES layers(id),
            name TEXT NOT NULL,
            alias TEXT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE layer_profiles (
            id INTEGER PRIMARY KEY,
            layer_id INTEGER NOT NULL REFERENCES layers(id),
            subphase_id INTEGER NOT NULL REFERENCES subphases(id)
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE fme_servers (
            id INTEGER PRIMARY KEY,
            server TEXT NOT NULL,
            port INTEGER NOT NULL,
            UNIQUE(server, port)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE fme_profiles (
            id INTEGER PRIMARY KEY,
            fme_server_id INTEGER NOT NULL REFERENCES fme_servers(id),
            routine TEXT NOT NULL,
            requires_finalization INTEGER NOT NULL DEFAULT 0,
            generates_false_positive INTEGER NOT NULL DEFAULT 0,
            subphase_id INTEGER NOT NULL REFERENCES subphases(id),
            ordem INTEGER NOT NULL,
            UNIQUE(subphase_id, routine)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE model_profiles (
            id INTEGER PRIMARY KEY,
            qgis_model_id INTEGER NOT NULL REFERENCES qgis_models(id),
            parameters TEXT NULL,
            requires_finalization INTEGER NOT NULL DEFAULT 0,
            generates_false_positive INTEGER NOT NULL DEFAULT 0,
            subphase_id INTEGER NOT NULL REFERENCES subphases(id),
            ordem INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE rule_profiles (
            id INTEGER PRIMARY KEY,
            rule_group_id INTEGER NOT NULL REFERENCES rule_groups(id),
            subphase_id INTEGER NOT NULL REFERENCES subphases(id)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE style_profiles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            subphase_id INTEGER NOT NULL REFERENCES subphases(id)
        )",
        [],
    )?;

    Ok(())
}
