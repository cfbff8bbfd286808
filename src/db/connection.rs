use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::db::migrations::MigrationManager;
use crate::spatial;

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        Config::base_dir().join("sap.db")
    }

    /// Get database path from the rc file or default
    pub fn resolve_path() -> Result<PathBuf> {
        let config = Config::load()?;
        Ok(config.data_location.unwrap_or_else(Self::default_path))
    }

    /// Connect to the configured database, creating it and parent directories if needed
    pub fn connect() -> Result<Connection> {
        let db_path = Self::resolve_path()?;
        Self::connect_at(&db_path)
    }

    /// Connect to a database file at an explicit path
    pub fn connect_at(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        Self::prepare(&conn)?;
        log::debug!("Opened database {}", db_path.display());
        Ok(conn)
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::prepare(&conn)?;
        Ok(conn)
    }

    fn prepare(conn: &Connection) -> Result<()> {
        // foreign_keys is per connection and a no-op inside a transaction
        conn.execute_batch("PRAGMA foreign_keys=ON")
            .context("Failed to enable foreign keys")?;
        // Writers wait for each other instead of failing with SQLITE_BUSY
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        // Id sets are bound as one array value through rarray()
        rusqlite::vtab::array::load_module(conn)
            .context("Failed to load the array module")?;
        spatial::register_functions(conn)
            .context("Failed to register spatial functions")?;
        MigrationManager::initialize(conn)
            .context("Failed to initialize database schema")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_path() {
        let path = DbConnection::default_path();
        assert!(path.to_string_lossy().contains(".sap"));
        assert!(path.to_string_lossy().ends_with("sap.db"));
    }

    #[test]
    fn test_connect_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        DbConnection::connect_at(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_connect_in_memory() {
        let conn = DbConnection::connect_in_memory().unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, 2);

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_spatial_functions_available() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let hit: bool = conn
            .query_row(
                "SELECT st_intersects('POINT(1 1)', 'POLYGON((0 0,2 0,2 2,0 2,0 0))')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(hit);
    }
}
