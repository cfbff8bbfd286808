use rusqlite::Connection;
use crate::external::{ensure_routines_valid, JobService, RoutineRef};
use crate::models::{FmeProfile, ModelProfile, RuleProfile, StyleProfile};
use super::{ensure_ids_exist, guarded_delete, require_id};
use anyhow::{Context, Result};

/// FME routine profile repository
pub struct FmeProfileRepo;

/// QGIS model profile repository
pub struct ModelProfileRepo;

/// Rule profile repository
pub struct RuleProfileRepo;

/// Style profile repository
pub struct StyleProfileRepo;

fn routine_refs(profiles: &[FmeProfile]) -> Vec<RoutineRef> {
    profiles
        .iter()
        .map(|p| RoutineRef {
            fme_server_id: p.fme_server_id,
            routine: p.routine.clone(),
        })
        .collect()
}

impl FmeProfileRepo {
    /// Profiles with their subphase name, in subphase order
    pub fn list(conn: &Connection) -> Result<Vec<FmeProfile>> {
        let mut stmt = conn.prepare(
            "SELECT fp.id, fp.fme_server_id, fp.routine, fp.requires_finalization,
                    fp.generates_false_positive, fp.subphase_id, fp.ordem, sp.name
             FROM fme_profiles AS fp
             INNER JOIN subphases AS sp ON sp.id = fp.subphase_id
             ORDER BY fp.subphase_id, fp.ordem"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FmeProfile {
                id: row.get(0)?,
                fme_server_id: row.get(1)?,
                routine: row.get(2)?,
                requires_finalization: row.get(3)?,
                generates_false_positive: row.get(4)?,
                subphase_id: row.get(5)?,
                ordem: row.get(6)?,
                subphase: row.get(7)?,
            })
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    /// Insert profiles once the job service accepts their routines
    pub fn create<S: JobService + ?Sized>(
        conn: &Connection,
        profiles: &[FmeProfile],
        service: &S,
    ) -> Result<Vec<i64>> {
        ensure_routines_valid(service, &routine_refs(profiles))?;

        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(profiles.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fme_profiles
                    (fme_server_id, routine, requires_finalization, generates_false_positive, subphase_id, ordem)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            )?;
            for profile in profiles {
                stmt.execute(rusqlite::params![
                    profile.fme_server_id,
                    profile.routine,
                    profile.requires_finalization,
                    profile.generates_false_positive,
                    profile.subphase_id,
                    profile.ordem,
                ])
                .with_context(|| format!(
                    "Failed to create FME profile '{}' for subphase {}",
                    profile.routine, profile.subphase_id
                ))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Update profiles by id once the job service accepts their routines
    pub fn update<S: JobService + ?Sized>(conn: &Connection, profiles: &[FmeProfile], service: &S) -> Result<()> {
        let ids = profiles
            .iter()
            .map(|p| require_id(p.id, "FME profile"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "fme_profiles", &ids, "The request contains FME profiles that do not exist")?;
        ensure_routines_valid(service, &routine_refs(profiles))?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE fme_profiles SET fme_server_id = ?1, routine = ?2, requires_finalization = ?3,
                    generates_false_positive = ?4, subphase_id = ?5, ordem = ?6
                 WHERE id = ?7"
            )?;
            for (profile, id) in profiles.iter().zip(&ids) {
                stmt.execute(rusqlite::params![
                    profile.fme_server_id,
                    profile.routine,
                    profile.requires_finalization,
                    profile.generates_false_positive,
                    profile.subphase_id,
                    profile.ordem,
                    id,
                ])
                .with_context(|| format!("Failed to update FME profile {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "fme_profiles", ids, "The request contains FME profiles that do not exist", &[])
    }
}

impl ModelProfileRepo {
    /// Profiles with the model name and description
    pub fn list(conn: &Connection) -> Result<Vec<ModelProfile>> {
        let mut stmt = conn.prepare(
            "SELECT mp.id, mp.qgis_model_id, mp.parameters, mp.requires_finalization,
                    mp.generates_false_positive, mp.subphase_id, mp.ordem, m.name, m.description
             FROM model_profiles AS mp
             INNER JOIN qgis_models AS m ON m.id = mp.qgis_model_id
             ORDER BY mp.subphase_id, mp.ordem"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelProfile {
                id: row.get(0)?,
                qgis_model_id: row.get(1)?,
                parameters: row.get(2)?,
                requires_finalization: row.get(3)?,
                generates_false_positive: row.get(4)?,
                subphase_id: row.get(5)?,
                ordem: row.get(6)?,
                model_name: row.get(7)?,
                model_description: row.get(8)?,
            })
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn create(conn: &Connection, profiles: &[ModelProfile]) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(profiles.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO model_profiles
                    (qgis_model_id, parameters, requires_finalization, generates_false_positive, subphase_id, ordem)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            )?;
            for profile in profiles {
                stmt.execute(rusqlite::params![
                    profile.qgis_model_id,
                    profile.parameters,
                    profile.requires_finalization,
                    profile.generates_false_positive,
                    profile.subphase_id,
                    profile.ordem,
                ])
                .with_context(|| format!(
                    "Failed to create model profile for model {} in subphase {}",
                    profile.qgis_model_id, profile.subphase_id
                ))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, profiles: &[ModelProfile]) -> Result<()> {
        let ids = profiles
            .iter()
            .map(|p| require_id(p.id, "Model profile"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "model_profiles", &ids, "The request contains model profiles that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE model_profiles SET qgis_model_id = ?1, parameters = ?2, requires_finalization = ?3,
                    generates_false_positive = ?4, subphase_id = ?5, ordem = ?6
                 WHERE id = ?7"
            )?;
            for (profile, id) in profiles.iter().zip(&ids) {
                stmt.execute(rusqlite::params![
                    profile.qgis_model_id,
                    profile.parameters,
                    profile.requires_finalization,
                    profile.generates_false_positive,
                    profile.subphase_id,
                    profile.ordem,
                    id,
                ])
                .with_context(|| format!("Failed to update model profile {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "model_profiles", ids, "The request contains model profiles that do not exist", &[])
    }
}

impl RuleProfileRepo {
    pub fn list(conn: &Connection) -> Result<Vec<RuleProfile>> {
        let mut stmt = conn.prepare(
            "SELECT id, rule_group_id, subphase_id FROM rule_profiles ORDER BY subphase_id, id"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RuleProfile {
                id: row.get(0)?,
                rule_group_id: row.get(1)?,
                subphase_id: row.get(2)?,
            })
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn create(conn: &Connection, profiles: &[RuleProfile]) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(profiles.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO rule_profiles (rule_group_id, subphase_id) VALUES (?1, ?2)"
            )?;
            for profile in profiles {
                stmt.execute(rusqlite::params![profile.rule_group_id, profile.subphase_id])
                    .with_context(|| format!(
                        "Failed to create rule profile for group {} in subphase {}",
                        profile.rule_group_id, profile.subphase_id
                    ))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, profiles: &[RuleProfile]) -> Result<()> {
        let ids = profiles
            .iter()
            .map(|p| require_id(p.id, "Rule profile"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "rule_profiles", &ids, "The request contains rule profiles that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE rule_profiles SET rule_group_id = ?1, subphase_id = ?2 WHERE id = ?3"
            )?;
            for (profile, id) in profiles.iter().zip(&ids) {
                stmt.execute(rusqlite::params![profile.rule_group_id, profile.subphase_id, id])
                    .with_context(|| format!("Failed to update rule profile {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "rule_profiles", ids, "The request contains rule profiles that do not exist", &[])
    }
}

impl StyleProfileRepo {
    pub fn list(conn: &Connection) -> Result<Vec<StyleProfile>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, subphase_id FROM style_profiles ORDER BY subphase_id, name"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StyleProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                subphase_id: row.get(2)?,
            })
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn create(conn: &Connection, profiles: &[StyleProfile]) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(profiles.len());
        {
            let mut stmt = tx.prepare("INSERT INTO style_profiles (name, subphase_id) VALUES (?1, ?2)")?;
            for profile in profiles {
                stmt.execute(rusqlite::params![profile.name, profile.subphase_id])
                    .with_context(|| format!("Failed to create style profile '{}'", profile.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, profiles: &[StyleProfile]) -> Result<()> {
        let ids = profiles
            .iter()
            .map(|p| require_id(p.id, "Style profile"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "style_profiles", &ids, "The request contains style profiles that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE style_profiles SET name = ?1, subphase_id = ?2 WHERE id = ?3")?;
            for (profile, id) in profiles.iter().zip(&ids) {
                stmt.execute(rusqlite::params![profile.name, profile.subphase_id, id])
                    .with_context(|| format!("Failed to update style profile {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "style_profiles", ids, "The request contains style profiles that do not exist", &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::error::SapError;

    struct Validator(bool);

    impl JobService for Validator {
        fn check_connection(&self, _server: &str, _port: u16) -> Result<bool> {
            Ok(true)
        }

        fn validate_routine_parameters(&self, _routines: &[RoutineRef]) -> Result<bool> {
            Ok(self.0)
        }
    }

    fn setup() -> Connection {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO projects (id, name) VALUES (1, 'P');
             INSERT INTO production_lines (id, name, project_id, product_type) VALUES (1, 'L', 1, 'Map');
             INSERT INTO phases (id, phase_type, production_line_id, ordem) VALUES (1, 'Vectorization', 1, 1);
             INSERT INTO subphases (id, name, phase_id, ordem) VALUES (1, 'Hydrography', 1, 1);
             INSERT INTO fme_servers (id, server, port) VALUES (1, 'fme1', 8080);
             INSERT INTO qgis_models (id, name, description, model_xml, owner, updated_ts)
                VALUES (1, 'snap', 'Snap lines', '<Model/>', 'A', 0);
             INSERT INTO rule_groups (id, name, color_rgb, ordem) VALUES (1, 'Hydro', '0,0,255', 1);",
        )
        .unwrap();
        conn
    }

    fn fme_profile(routine: &str) -> FmeProfile {
        FmeProfile {
            id: None,
            fme_server_id: 1,
            routine: routine.into(),
            requires_finalization: true,
            generates_false_positive: false,
            subphase_id: 1,
            ordem: 1,
            subphase: None,
        }
    }

    #[test]
    fn test_fme_profile_create_validated() {
        let conn = setup();
        let ids = FmeProfileRepo::create(&conn, &[fme_profile("validate_hydro")], &Validator(true)).unwrap();
        assert_eq!(ids.len(), 1);

        let listed = FmeProfileRepo::list(&conn).unwrap();
        assert_eq!(listed[0].subphase.as_deref(), Some("Hydrography"));
        assert!(listed[0].requires_finalization);
    }

    #[test]
    fn test_fme_profile_rejected_by_service() {
        let conn = setup();
        let err = FmeProfileRepo::create(&conn, &[fme_profile("bad_routine")], &Validator(false)).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::ExternalService(_))));
        assert!(FmeProfileRepo::list(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_fme_profile_update_validated() {
        let conn = setup();
        let ids = FmeProfileRepo::create(&conn, &[fme_profile("validate_hydro")], &Validator(true)).unwrap();
        let mut changed = fme_profile("validate_hydro_v2");
        changed.id = Some(ids[0]);

        assert!(FmeProfileRepo::update(&conn, &[changed.clone()], &Validator(false)).is_err());
        FmeProfileRepo::update(&conn, &[changed], &Validator(true)).unwrap();
        assert_eq!(FmeProfileRepo::list(&conn).unwrap()[0].routine, "validate_hydro_v2");
    }

    #[test]
    fn test_model_profile_listing_joins_model() {
        let conn = setup();
        let profile = ModelProfile {
            id: None,
            qgis_model_id: 1,
            parameters: Some(r#"{"tolerance": 0.5}"#.into()),
            requires_finalization: false,
            generates_false_positive: true,
            subphase_id: 1,
            ordem: 1,
            model_name: None,
            model_description: None,
        };
        ModelProfileRepo::create(&conn, &[profile]).unwrap();

        let listed = ModelProfileRepo::list(&conn).unwrap();
        assert_eq!(listed[0].model_name.as_deref(), Some("snap"));
        assert_eq!(listed[0].model_description.as_deref(), Some("Snap lines"));
    }

    #[test]
    fn test_rule_and_style_profiles() {
        let conn = setup();
        let rule_ids = RuleProfileRepo::create(&conn, &[RuleProfile { id: None, rule_group_id: 1, subphase_id: 1 }])
            .unwrap();
        let style_ids = StyleProfileRepo::create(
            &conn,
            &[StyleProfile { id: None, name: "night".into(), subphase_id: 1 }],
        )
        .unwrap();

        StyleProfileRepo::update(
            &conn,
            &[StyleProfile { id: Some(style_ids[0]), name: "day".into(), subphase_id: 1 }],
        )
        .unwrap();
        assert_eq!(StyleProfileRepo::list(&conn).unwrap()[0].name, "day");

        assert_eq!(RuleProfileRepo::delete(&conn, &rule_ids).unwrap(), 1);
        assert!(RuleProfileRepo::list(&conn).unwrap().is_empty());
    }
}
