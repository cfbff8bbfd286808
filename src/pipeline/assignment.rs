//! Activity assignment and work-unit copies between subphases.

use rusqlite::Connection;
use crate::error::SapError;
use crate::models::CopiedWorkUnit;
use crate::repo::{ActivityRepo, InputRepo, StageRepo, WorkUnitRepo};
use anyhow::Result;

/// Create not-started activities for work units in a stage
///
/// Units outside the stage's subphase, and units that already have a
/// non-canceled activity in the stage, are skipped. Fails with a state error
/// when nothing is left to create.
pub fn create_activities(conn: &Connection, work_unit_ids: &[i64], stage_id: i64) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let created = ActivityRepo::create_for_stage(&tx, work_unit_ids, stage_id)?;
    tx.commit()?;
    Ok(created)
}

/// Delete activities that have not been started or are paused
///
/// Running, finished and canceled activities in the request are left alone.
pub fn delete_activities(conn: &Connection, activity_ids: &[i64]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let deleted = ActivityRepo::delete(&tx, activity_ids)?;
    tx.commit()?;
    Ok(deleted)
}

/// Copy work units into the subphase of a set of stages
///
/// # Arguments
/// * `work_unit_ids` - Units to copy
/// * `stage_ids` - Target stages; the first one decides the destination
///   subphase and all of them must belong to it
/// * `copy_inputs` - Also copy every input binding of each source unit
///
/// # Returns
/// Source/copy id pairs in request order. Every copy gets a not-started
/// activity in each target stage.
pub fn copy_work_units(
    conn: &Connection,
    work_unit_ids: &[i64],
    stage_ids: &[i64],
    copy_inputs: bool,
) -> Result<Vec<CopiedWorkUnit>> {
    let Some(&first_stage_id) = stage_ids.first() else {
        return Err(SapError::Validation("At least one target stage is required".to_string()).into());
    };

    let tx = conn.unchecked_transaction()?;

    let target = StageRepo::get_by_id(&tx, first_stage_id)?
        .ok_or_else(|| SapError::Validation(format!("Stage {} not found", first_stage_id)))?;
    for &stage_id in &stage_ids[1..] {
        match StageRepo::get_by_id(&tx, stage_id)? {
            Some(stage) if stage.subphase_id == target.subphase_id => {}
            Some(_) => {
                return Err(SapError::Validation(format!(
                    "Stage {} does not belong to subphase {}",
                    stage_id, target.subphase_id
                ))
                .into())
            }
            None => return Err(SapError::Validation(format!("Stage {} not found", stage_id)).into()),
        }
    }

    let mut copies = Vec::with_capacity(work_unit_ids.len());
    for &source_id in work_unit_ids {
        let copy_id = WorkUnitRepo::copy_into(&tx, source_id, target.subphase_id)?
            .ok_or_else(|| SapError::Validation(format!("Work unit {} not found", source_id)))?;

        for &stage_id in stage_ids {
            ActivityRepo::create(&tx, stage_id, copy_id)?;
        }
        if copy_inputs {
            let bindings = InputRepo::copy_bindings(&tx, source_id, copy_id)?;
            log::debug!("Copied {} input bindings from work unit {} to {}", bindings, source_id, copy_id);
        }
        copies.push(CopiedWorkUnit { source_id, copy_id });
    }

    tx.commit()?;
    log::info!(
        "Copied {} work units into subphase {} with {} stages each",
        copies.len(),
        target.subphase_id,
        stage_ids.len()
    );
    Ok(copies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::ActivityStatus;

    fn setup() -> Connection {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO projects (id, name) VALUES (1, 'P');
             INSERT INTO production_lines (id, name, project_id, product_type) VALUES (1, 'L', 1, 'Map');
             INSERT INTO phases (id, phase_type, production_line_id, ordem) VALUES (1, 'Vectorization', 1, 1);
             INSERT INTO subphases (id, name, phase_id, ordem) VALUES (1, 'Source', 1, 1), (2, 'Target', 1, 2);
             INSERT INTO stages (id, kind, subphase_id, ordem) VALUES
                (10, 1, 1, 1), (20, 1, 2, 1), (21, 2, 2, 2);
             INSERT INTO work_units (id, name, geom, subphase_id, priority, note) VALUES
                (1, 'A', 'POLYGON((0 0,1 0,1 1,0 1,0 0))', 1, 5, 'source only'),
                (2, 'B', 'POINT(3 3)', 1, 0, NULL);
             INSERT INTO input_groups (id, name) VALUES (1, 'G');
             INSERT INTO inputs (id, name, path, input_group_id) VALUES (1, 'I1', '/1', 1), (2, 'I2', '/2', 1);
             INSERT INTO input_bindings (work_unit_id, input_id, default_path) VALUES (1, 1, 'C:/'), (1, 2, 'C:/');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_copy_creates_activities_in_every_stage() {
        let conn = setup();
        let copies = copy_work_units(&conn, &[1, 2], &[20, 21], false).unwrap();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].source_id, 1);

        for copy in &copies {
            let unit = WorkUnitRepo::get_by_id(&conn, copy.copy_id).unwrap().unwrap();
            assert_eq!(unit.subphase_id, Some(2));

            let activities = ActivityRepo::list_by_work_unit(&conn, copy.copy_id).unwrap();
            let stages: Vec<i64> = activities.iter().map(|a| a.stage_id).collect();
            assert_eq!(stages, vec![20, 21]);
        }
        assert!(InputRepo::list_bindings(&conn, copies[0].copy_id).unwrap().is_empty());
    }

    #[test]
    fn test_copy_with_inputs() {
        let conn = setup();
        let copies = copy_work_units(&conn, &[1], &[20], true).unwrap();
        let bindings = InputRepo::list_bindings(&conn, copies[0].copy_id).unwrap();
        assert_eq!(bindings.len(), 2);
        // Source keeps its bindings
        assert_eq!(InputRepo::list_bindings(&conn, 1).unwrap().len(), 2);
    }

    #[test]
    fn test_copy_validation() {
        let conn = setup();
        let err = copy_work_units(&conn, &[1], &[], false).unwrap_err();
        assert!(matches!(err.downcast_ref::<SapError>(), Some(SapError::Validation(_))));

        assert!(copy_work_units(&conn, &[1], &[999], false).is_err());
        // Stage 10 lives in another subphase
        assert!(copy_work_units(&conn, &[1], &[20, 10], false).is_err());

        // A missing unit rolls back the copies made before it
        assert!(copy_work_units(&conn, &[1, 404], &[20], false).is_err());
        assert!(WorkUnitRepo::list_by_subphase(&conn, 2).unwrap().is_empty());
    }

    #[test]
    fn test_create_and_delete_activities() {
        let conn = setup();
        assert_eq!(create_activities(&conn, &[1, 2], 10).unwrap(), 2);
        assert!(create_activities(&conn, &[1, 2], 10).is_err());

        let activities = ActivityRepo::list_by_stage(&conn, 10).unwrap();
        ActivityRepo::set_status(&conn, activities[0].id, ActivityStatus::Finished).unwrap();
        let ids: Vec<i64> = activities.iter().map(|a| a.id).collect();
        assert_eq!(delete_activities(&conn, &ids).unwrap(), 1);
    }
}
