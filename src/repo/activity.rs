use rusqlite::{Connection, OptionalExtension};
use crate::error::SapError;
use crate::models::{Activity, ActivityStatus};
use super::{id_list, with_ids};
use anyhow::{Context, Result};

/// Activity (atividade) repository
pub struct ActivityRepo;

impl ActivityRepo {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Activity> {
        Ok(Activity {
            id: row.get(0)?,
            stage_id: row.get(1)?,
            work_unit_id: row.get(2)?,
            status: row.get(3)?,
        })
    }

    /// Insert a not-started activity binding a work unit to a stage
    pub fn create(conn: &Connection, stage_id: i64, work_unit_id: i64) -> Result<Activity> {
        conn.execute(
            "INSERT INTO activities (stage_id, work_unit_id, status) VALUES (?1, ?2, ?3)",
            rusqlite::params![stage_id, work_unit_id, ActivityStatus::NotStarted.code()],
        )
        .with_context(|| format!(
            "Failed to create activity for work unit {} in stage {}",
            work_unit_id, stage_id
        ))?;

        Ok(Activity {
            id: conn.last_insert_rowid(),
            stage_id,
            work_unit_id,
            status: ActivityStatus::NotStarted,
        })
    }

    /// Bulk-create not-started activities in a stage
    ///
    /// Only units belonging to the stage's subphase and lacking a non-canceled
    /// activity in it are inserted. Inserting nothing is a state error: the
    /// activities already exist.
    pub fn create_for_stage(conn: &Connection, work_unit_ids: &[i64], stage_id: i64) -> Result<usize> {
        let sql = format!(
            "INSERT INTO activities (stage_id, work_unit_id, status)
             SELECT DISTINCT s.id, wu.id, ?2
             FROM work_units AS wu
             INNER JOIN stages AS s ON s.subphase_id = wu.subphase_id
             LEFT JOIN (
                SELECT id, stage_id, work_unit_id FROM activities WHERE status != ?3
             ) AS a ON a.work_unit_id = wu.id AND a.stage_id = s.id
             WHERE s.id = ?1 AND a.id IS NULL AND wu.id IN ({})",
            id_list(4)
        );
        let not_started = ActivityStatus::NotStarted.code();
        let canceled = ActivityStatus::Canceled.code();
        let inserted = conn
            .execute(&sql, with_ids(&[&stage_id, &not_started, &canceled], work_unit_ids))
            .with_context(|| format!("Failed to create activities in stage {}", stage_id))?;

        if inserted == 0 {
            log::warn!("No activities created in stage {}: all already exist", stage_id);
            return Err(SapError::State(
                "The activities cannot be created because they already exist".to_string(),
            )
            .into());
        }
        log::info!("Created {} activities in stage {}", inserted, stage_id);
        Ok(inserted)
    }

    /// Delete activities that are not started or paused; others are left untouched
    pub fn delete(conn: &Connection, activity_ids: &[i64]) -> Result<usize> {
        let [first, second] = ActivityStatus::DELETABLE.map(|s| s.code());
        let sql = format!(
            "DELETE FROM activities WHERE status IN (?1, ?2) AND id IN ({})",
            id_list(3)
        );
        let deleted = conn
            .execute(&sql, with_ids(&[&first, &second], activity_ids))
            .context("Failed to delete activities")?;
        if deleted < activity_ids.len() {
            log::info!(
                "Deleted {} of {} requested activities; the rest are started or do not exist",
                deleted,
                activity_ids.len()
            );
        }
        Ok(deleted)
    }

    /// Get activity by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Activity>> {
        conn.query_row(
            "SELECT id, stage_id, work_unit_id, status FROM activities WHERE id = ?1",
            [id],
            Self::from_row,
        )
        .optional()
        .with_context(|| format!("Failed to query activity {}", id))
    }

    /// Activities of a work unit, by stage position
    pub fn list_by_work_unit(conn: &Connection, work_unit_id: i64) -> Result<Vec<Activity>> {
        let mut stmt = conn.prepare(
            "SELECT a.id, a.stage_id, a.work_unit_id, a.status
             FROM activities AS a
             INNER JOIN stages AS s ON s.id = a.stage_id
             WHERE a.work_unit_id = ?1
             ORDER BY s.ordem, a.id"
        )?;
        let rows = stmt.query_map([work_unit_id], Self::from_row)?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?);
        }
        Ok(activities)
    }

    /// Activities in a stage
    pub fn list_by_stage(conn: &Connection, stage_id: i64) -> Result<Vec<Activity>> {
        let mut stmt = conn.prepare(
            "SELECT id, stage_id, work_unit_id, status FROM activities
             WHERE stage_id = ?1 ORDER BY work_unit_id, id"
        )?;
        let rows = stmt.query_map([stage_id], Self::from_row)?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?);
        }
        Ok(activities)
    }

    /// Set the status of an activity
    #[cfg(test)]
    pub(crate) fn set_status(conn: &Connection, id: i64, status: ActivityStatus) -> Result<()> {
        let updated = conn
            .execute(
                "UPDATE activities SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.code(), id],
            )
            .with_context(|| format!("Failed to update activity {}", id))?;

        if updated == 0 {
            return Err(SapError::Validation(format!("Activity {} not found", id)).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    fn setup() -> Connection {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO projects (id, name) VALUES (1, 'P');
             INSERT INTO production_lines (id, name, project_id, product_type) VALUES (1, 'L', 1, 'Map');
             INSERT INTO phases (id, phase_type, production_line_id, ordem) VALUES (1, 'Vectorization', 1, 1);
             INSERT INTO subphases (id, name, phase_id, ordem) VALUES (1, 'S1', 1, 1), (2, 'S2', 1, 2);
             INSERT INTO stages (id, kind, subphase_id, ordem) VALUES (10, 1, 1, 1), (20, 1, 2, 1);
             INSERT INTO work_units (id, name, geom, subphase_id) VALUES
                (1, 'A', 'POINT(0 0)', 1),
                (2, 'B', 'POINT(0 0)', 1),
                (3, 'C', 'POINT(0 0)', 2);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_create_for_stage_filters_by_subphase() {
        let conn = setup();
        let inserted = ActivityRepo::create_for_stage(&conn, &[1, 2, 3], 10).unwrap();
        // Unit 3 belongs to another subphase
        assert_eq!(inserted, 2);
        assert_eq!(ActivityRepo::list_by_stage(&conn, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_create_for_stage_skips_existing() {
        let conn = setup();
        ActivityRepo::create(&conn, 10, 1).unwrap();

        let inserted = ActivityRepo::create_for_stage(&conn, &[1, 2], 10).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_create_for_stage_ignores_canceled() {
        let conn = setup();
        let canceled = ActivityRepo::create(&conn, 10, 1).unwrap();
        ActivityRepo::set_status(&conn, canceled.id, ActivityStatus::Canceled).unwrap();

        assert_eq!(ActivityRepo::create_for_stage(&conn, &[1], 10).unwrap(), 1);
        assert_eq!(ActivityRepo::list_by_work_unit(&conn, 1).unwrap().len(), 2);
    }

    #[test]
    fn test_create_for_stage_fails_when_nothing_inserted() {
        let conn = setup();
        ActivityRepo::create(&conn, 10, 1).unwrap();

        let err = ActivityRepo::create_for_stage(&conn, &[1], 10).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::State(_))));
        assert_eq!(ActivityRepo::list_by_stage(&conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_large_id_batches() {
        let conn = setup();
        let ids: Vec<i64> = (1..=40_000).collect();

        assert_eq!(ActivityRepo::create_for_stage(&conn, &ids, 10).unwrap(), 2);
        assert_eq!(ActivityRepo::delete(&conn, &ids).unwrap(), 2);
        assert!(ActivityRepo::list_by_stage(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_only_not_started_or_paused() {
        let conn = setup();
        let a = ActivityRepo::create(&conn, 10, 1).unwrap();
        let b = ActivityRepo::create(&conn, 10, 2).unwrap();
        let c = ActivityRepo::create(&conn, 20, 3).unwrap();
        ActivityRepo::set_status(&conn, b.id, ActivityStatus::Paused).unwrap();
        ActivityRepo::set_status(&conn, c.id, ActivityStatus::Running).unwrap();

        let deleted = ActivityRepo::delete(&conn, &[a.id, b.id, c.id]).unwrap();
        assert_eq!(deleted, 2);
        assert!(ActivityRepo::get_by_id(&conn, a.id).unwrap().is_none());
        assert!(ActivityRepo::get_by_id(&conn, c.id).unwrap().is_some());
    }
}
