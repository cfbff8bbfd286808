//! Review and correction cycles over a subphase's stage pipeline.
//!
//! Each call runs in one IMMEDIATE transaction: the write lock is held from the
//! max-ordem read to the commit, and UNIQUE(subphase_id, ordem) backs it up.
//! Units are processed in request order, so a stage pair created for one unit
//! is reused by the next unit of the same subphase.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use crate::error::SapError;
use crate::models::StageKind;
use crate::repo::{ActivityRepo, StageRepo};
use anyhow::{Context, Result};

/// Stages a work unit was assigned to by a review request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewAssignment {
    pub work_unit_id: i64,
    /// Review stage, or the combined review/correction stage
    pub review_stage_id: i64,
    /// Paired correction stage; `None` for combined cycles
    pub correction_stage_id: Option<i64>,
    /// Whether the stages were created for this unit rather than reused
    pub created: bool,
}

/// Review stage and the correction stage paired with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewPair {
    pub review_stage_id: i64,
    pub correction_stage_id: i64,
}

fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .context("Failed to start review cycle transaction")
}

/// Put work units through a review followed by a correction
///
/// For each unit, reuses the first Review and the first Correction stage of its
/// subphase that the unit has no activity in. When either is missing, a new
/// pair is appended at the end of the pipeline; a lone open stage is left where
/// it is. Two not-started activities are then created for the unit.
///
/// # Arguments
/// * `work_unit_ids` - Units to review, processed in order
///
/// # Returns
/// One assignment per unit
///
/// # Errors
/// State error when a unit does not exist or its subphase has no stages; the
/// whole request is rolled back.
pub fn create_review_cycle(conn: &Connection, work_unit_ids: &[i64]) -> Result<Vec<ReviewAssignment>> {
    let tx = begin_immediate(conn)?;
    let mut assignments = Vec::with_capacity(work_unit_ids.len());

    for &unit_id in work_unit_ids {
        let tail = StageRepo::pipeline_tail(&tx, unit_id)?;
        let review = StageRepo::first_unassigned(&tx, unit_id, StageKind::Review)?;
        let correction = StageRepo::first_unassigned(&tx, unit_id, StageKind::Correction)?;

        let (review_id, correction_id, created) = match (review, correction) {
            (Some(review_id), Some(correction_id)) => {
                log::debug!(
                    "Work unit {}: reusing review stage {} and correction stage {}",
                    unit_id, review_id, correction_id
                );
                (review_id, correction_id, false)
            }
            _ => {
                let review = StageRepo::create(&tx, tail.subphase_id, StageKind::Review, tail.max_ordem + 1)?;
                let correction =
                    StageRepo::create(&tx, tail.subphase_id, StageKind::Correction, tail.max_ordem + 2)?;
                log::debug!(
                    "Work unit {}: created review stage {} and correction stage {} at positions {} and {} of subphase {}",
                    unit_id, review.id, correction.id, review.ordem, correction.ordem, tail.subphase_id
                );
                (review.id, correction.id, true)
            }
        };

        ActivityRepo::create(&tx, review_id, unit_id)?;
        ActivityRepo::create(&tx, correction_id, unit_id)?;
        assignments.push(ReviewAssignment {
            work_unit_id: unit_id,
            review_stage_id: review_id,
            correction_stage_id: Some(correction_id),
            created,
        });
    }

    tx.commit()?;
    log::info!("Created review cycles for {} work units", assignments.len());
    Ok(assignments)
}

/// Put work units through a combined review/correction stage
///
/// Same pattern as [`create_review_cycle`] with a single stage of kind
/// review/correction, appended at the end of the pipeline when none is open.
pub fn create_review_correction_cycle(conn: &Connection, work_unit_ids: &[i64]) -> Result<Vec<ReviewAssignment>> {
    let tx = begin_immediate(conn)?;
    let mut assignments = Vec::with_capacity(work_unit_ids.len());

    for &unit_id in work_unit_ids {
        let tail = StageRepo::pipeline_tail(&tx, unit_id)?;

        let (stage_id, created) = match StageRepo::first_unassigned(&tx, unit_id, StageKind::ReviewCorrection)? {
            Some(stage_id) => {
                log::debug!("Work unit {}: reusing review/correction stage {}", unit_id, stage_id);
                (stage_id, false)
            }
            None => {
                let stage =
                    StageRepo::create(&tx, tail.subphase_id, StageKind::ReviewCorrection, tail.max_ordem + 1)?;
                log::debug!(
                    "Work unit {}: created review/correction stage {} at position {} of subphase {}",
                    unit_id, stage.id, stage.ordem, tail.subphase_id
                );
                (stage.id, true)
            }
        };

        ActivityRepo::create(&tx, stage_id, unit_id)?;
        assignments.push(ReviewAssignment {
            work_unit_id: unit_id,
            review_stage_id: stage_id,
            correction_stage_id: None,
            created,
        });
    }

    tx.commit()?;
    log::info!("Created review/correction cycles for {} work units", assignments.len());
    Ok(assignments)
}

/// Remove a review stage together with its paired correction stage
///
/// Their activities go with them. Fails with a state error, deleting nothing,
/// unless `review_stage_id` is a Review stage directly followed by a Correction
/// stage in the same subphase.
pub fn remove_review_cycle(conn: &Connection, review_stage_id: i64) -> Result<ReviewPair> {
    let tx = begin_immediate(conn)?;

    let Some(correction_stage_id) = StageRepo::paired_correction(&tx, review_stage_id)? else {
        log::warn!("Stage {} is not a review stage paired with a correction", review_stage_id);
        return Err(SapError::State(format!(
            "Stage {} is not a review stage followed by its correction stage",
            review_stage_id
        ))
        .into());
    };

    StageRepo::delete(&tx, &[review_stage_id, correction_stage_id])?;
    tx.commit()?;

    log::info!(
        "Removed review stage {} and correction stage {}",
        review_stage_id, correction_stage_id
    );
    Ok(ReviewPair {
        review_stage_id,
        correction_stage_id,
    })
}
