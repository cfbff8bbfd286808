use rusqlite::Connection;
use crate::error::SapError;
use crate::external::{ensure_connection, JobService};
use crate::models::FmeServer;
use super::{ensure_ids_exist, guarded_delete, require_id};
use anyhow::{Context, Result};

/// FME server registry
pub struct FmeServerRepo;

impl FmeServerRepo {
    pub fn list(conn: &Connection) -> Result<Vec<FmeServer>> {
        let mut stmt = conn.prepare("SELECT id, server, port FROM fme_servers ORDER BY server, port")?;
        let rows = stmt.query_map([], |row| {
            Ok(FmeServer {
                id: row.get(0)?,
                server: row.get(1)?,
                port: row.get(2)?,
            })
        })?;

        let mut servers = Vec::new();
        for row in rows {
            servers.push(row?);
        }
        Ok(servers)
    }

    /// Register servers after probing each one
    ///
    /// A server/port pair already registered is a conflict; an unreachable
    /// server is an external-service error. Nothing is inserted on failure.
    pub fn create<S: JobService + ?Sized>(
        conn: &Connection,
        servers: &[FmeServer],
        service: &S,
    ) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        for server in servers {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM fme_servers WHERE server = ?1 AND port = ?2)",
                rusqlite::params![server.server, server.port],
                |row| row.get(0),
            )?;
            if exists {
                log::warn!("FME server {}:{} is already registered", server.server, server.port);
                return Err(SapError::Conflict(format!(
                    "FME server {}:{} is already registered",
                    server.server, server.port
                ))
                .into());
            }
            ensure_connection(service, &server.server, server.port)?;
        }

        let mut ids = Vec::with_capacity(servers.len());
        {
            let mut stmt = tx.prepare("INSERT INTO fme_servers (server, port) VALUES (?1, ?2)")?;
            for server in servers {
                stmt.execute(rusqlite::params![server.server, server.port])
                    .with_context(|| format!("Failed to register FME server {}:{}", server.server, server.port))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        log::info!("Registered {} FME servers", ids.len());
        Ok(ids)
    }

    /// Update servers by id, probing every one of them first
    pub fn update<S: JobService + ?Sized>(conn: &Connection, servers: &[FmeServer], service: &S) -> Result<()> {
        let ids = servers
            .iter()
            .map(|s| require_id(s.id, "FME server"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "fme_servers", &ids, "The request contains FME servers that do not exist")?;
        for server in servers {
            ensure_connection(service, &server.server, server.port)?;
        }

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE fme_servers SET server = ?1, port = ?2 WHERE id = ?3")?;
            for (server, id) in servers.iter().zip(&ids) {
                stmt.execute(rusqlite::params![server.server, server.port, id])
                    .with_context(|| format!("Failed to update FME server {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete servers no FME profile uses
    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(
            conn,
            "fme_servers",
            ids,
            "The request contains FME servers that do not exist",
            &[("fme_profiles", "fme_server_id", "FME servers used by FME profiles cannot be deleted")],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::external::RoutineRef;
    use std::cell::Cell;

    /// Counts probes and answers them with a fixed value
    struct Probe {
        reachable: bool,
        calls: Cell<usize>,
    }

    impl Probe {
        fn new(reachable: bool) -> Self {
            Self { reachable, calls: Cell::new(0) }
        }
    }

    impl JobService for Probe {
        fn check_connection(&self, _server: &str, _port: u16) -> Result<bool> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.reachable)
        }

        fn validate_routine_parameters(&self, _routines: &[RoutineRef]) -> Result<bool> {
            Ok(true)
        }
    }

    fn server(host: &str, port: u16) -> FmeServer {
        FmeServer { id: None, server: host.into(), port }
    }

    #[test]
    fn test_create_probes_and_inserts() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let probe = Probe::new(true);
        let ids = FmeServerRepo::create(&conn, &[server("fme1", 8080), server("fme2", 8080)], &probe).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(probe.calls.get(), 2);
        assert_eq!(FmeServerRepo::list(&conn).unwrap()[0].server, "fme1");
    }

    #[test]
    fn test_create_duplicate_is_conflict() {
        let conn = DbConnection::connect_in_memory().unwrap();
        FmeServerRepo::create(&conn, &[server("fme1", 8080)], &Probe::new(true)).unwrap();

        let err = FmeServerRepo::create(&conn, &[server("fme1", 8080)], &Probe::new(true)).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::Conflict(_))));
    }

    #[test]
    fn test_unreachable_server_is_not_registered() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let err = FmeServerRepo::create(&conn, &[server("down", 8080)], &Probe::new(false)).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::ExternalService(_))));
        assert!(FmeServerRepo::list(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_update_reprobes() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let ids = FmeServerRepo::create(&conn, &[server("fme1", 8080)], &Probe::new(true)).unwrap();
        let mut moved = server("fme1", 9090);
        moved.id = Some(ids[0]);

        assert!(FmeServerRepo::update(&conn, &[moved.clone()], &Probe::new(false)).is_err());
        FmeServerRepo::update(&conn, &[moved], &Probe::new(true)).unwrap();
        assert_eq!(FmeServerRepo::list(&conn).unwrap()[0].port, 9090);
    }
}
