use rusqlite::{Connection, OptionalExtension};
use crate::error::SapError;
use crate::models::{Stage, StageKind, StageSummary};
use anyhow::{Context, Result};

/// Stage (etapa) repository
///
/// Primitives over the ordered stage pipeline of each subphase. The review
/// cycle logic built on top of them lives in [`crate::pipeline`].
pub struct StageRepo;

/// Subphase of a work unit with the highest stage position in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTail {
    pub subphase_id: i64,
    pub max_ordem: i64,
}

impl StageRepo {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stage> {
        Ok(Stage {
            id: row.get(0)?,
            kind: row.get(1)?,
            subphase_id: row.get(2)?,
            ordem: row.get(3)?,
            note: row.get(4)?,
        })
    }

    /// Create a stage at a given position
    pub fn create(conn: &Connection, subphase_id: i64, kind: StageKind, ordem: i64) -> Result<Stage> {
        conn.execute(
            "INSERT INTO stages (kind, subphase_id, ordem) VALUES (?1, ?2, ?3)",
            rusqlite::params![kind.code(), subphase_id, ordem],
        )
        .with_context(|| format!(
            "Failed to create {:?} stage at position {} of subphase {}",
            kind, ordem, subphase_id
        ))?;

        Ok(Stage {
            id: conn.last_insert_rowid(),
            kind,
            subphase_id,
            ordem,
            note: None,
        })
    }

    /// Get stage by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Stage>> {
        conn.query_row(
            "SELECT id, kind, subphase_id, ordem, note FROM stages WHERE id = ?1",
            [id],
            Self::from_row,
        )
        .optional()
        .with_context(|| format!("Failed to query stage {}", id))
    }

    /// Stages of a subphase in pipeline order
    pub fn list_by_subphase(conn: &Connection, subphase_id: i64) -> Result<Vec<Stage>> {
        let mut stmt = conn.prepare(
            "SELECT id, kind, subphase_id, ordem, note
             FROM stages WHERE subphase_id = ?1 ORDER BY ordem"
        )?;
        let rows = stmt.query_map([subphase_id], Self::from_row)?;

        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    /// All stages with their subphase, phase, line and project names
    pub fn list_all(conn: &Connection) -> Result<Vec<StageSummary>> {
        let mut stmt = conn.prepare(
            "SELECT s.id, s.kind, sk.name, s.subphase_id, sp.name, s.ordem, s.note,
                    ph.phase_type, pl.name, p.name, p.finished
             FROM stages AS s
             INNER JOIN stage_kinds AS sk ON sk.code = s.kind
             INNER JOIN subphases AS sp ON sp.id = s.subphase_id
             INNER JOIN phases AS ph ON ph.id = sp.phase_id
             INNER JOIN production_lines AS pl ON pl.id = ph.production_line_id
             INNER JOIN projects AS p ON p.id = pl.project_id
             ORDER BY s.subphase_id, s.ordem"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StageSummary {
                id: row.get(0)?,
                kind: row.get(1)?,
                kind_name: row.get(2)?,
                subphase_id: row.get(3)?,
                subphase: row.get(4)?,
                ordem: row.get(5)?,
                note: row.get(6)?,
                phase_type: row.get(7)?,
                production_line: row.get(8)?,
                project: row.get(9)?,
                finished: row.get::<_, i64>(10)? != 0,
            })
        })?;

        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    /// Subphase of a work unit and the highest stage position in it
    ///
    /// Fails with a state error when the unit does not exist or its subphase has
    /// no stages; an empty pipeline is never bootstrapped here.
    pub fn pipeline_tail(conn: &Connection, work_unit_id: i64) -> Result<PipelineTail> {
        let tail = conn
            .query_row(
                "SELECT wu.subphase_id, MAX(s.ordem)
                 FROM work_units AS wu
                 INNER JOIN stages AS s ON s.subphase_id = wu.subphase_id
                 WHERE wu.id = ?1
                 GROUP BY wu.subphase_id",
                [work_unit_id],
                |row| {
                    Ok(PipelineTail {
                        subphase_id: row.get(0)?,
                        max_ordem: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to read pipeline of work unit {}", work_unit_id))?;

        tail.ok_or_else(|| {
            SapError::State(format!(
                "Work unit {} does not exist or its subphase has no stages",
                work_unit_id
            ))
            .into()
        })
    }

    /// First stage of `kind`, in pipeline order, that the work unit has no activity in
    ///
    /// Any activity counts here, canceled ones included.
    pub fn first_unassigned(conn: &Connection, work_unit_id: i64, kind: StageKind) -> Result<Option<i64>> {
        conn.query_row(
            "SELECT s.id
             FROM work_units AS wu
             INNER JOIN stages AS s ON s.subphase_id = wu.subphase_id
             LEFT JOIN activities AS a ON a.work_unit_id = wu.id AND a.stage_id = s.id
             WHERE wu.id = ?1 AND a.id IS NULL AND s.kind = ?2
             ORDER BY s.ordem
             LIMIT 1",
            rusqlite::params![work_unit_id, kind.code()],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!(
            "Failed to look up open {:?} stage for work unit {}",
            kind, work_unit_id
        ))
    }

    /// Correction stage paired with a review stage (same subphase, next position)
    pub fn paired_correction(conn: &Connection, review_stage_id: i64) -> Result<Option<i64>> {
        conn.query_row(
            "SELECT next.id
             FROM stages AS s
             INNER JOIN stages AS next
                ON next.ordem = s.ordem + 1 AND next.subphase_id = s.subphase_id
             WHERE s.id = ?1 AND s.kind = ?2 AND next.kind = ?3
             LIMIT 1",
            rusqlite::params![
                review_stage_id,
                StageKind::Review.code(),
                StageKind::Correction.code()
            ],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to look up correction paired with stage {}", review_stage_id))
    }

    /// Delete stages by id; their activities go with them (ON DELETE CASCADE)
    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        super::delete_by_ids(conn, "stages", ids)
    }
}
