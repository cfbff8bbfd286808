//! Association of input groups to work units.
//!
//! Each strategy is a set-based join evaluated inside the datastore with the
//! spatial SQL functions registered in [`crate::spatial`]. Inputs without a
//! geometry never match the geometric strategies.

use rusqlite::Connection;
use crate::models::AssociationStrategy;
use crate::repo::{id_list, with_ids};
use anyhow::{Context, Result};

impl AssociationStrategy {
    /// Join predicate between `wu` (work_units) and `i` (inputs)
    fn predicate(&self) -> &'static str {
        match self {
            AssociationStrategy::UnitCentroidInInput => "st_intersects(st_centroid(wu.geom), i.geom)",
            AssociationStrategy::InputCentroidInUnit => "st_intersects(st_centroid(i.geom), wu.geom)",
            AssociationStrategy::Intersects => "st_intersects(i.geom, wu.geom)",
            AssociationStrategy::Overlaps => "st_relate(wu.geom, i.geom, '2********')",
            AssociationStrategy::All => "1",
        }
    }
}

/// Bind the inputs of a group to work units by a spatial strategy
///
/// # Arguments
/// * `work_unit_ids` - Units to receive bindings
/// * `input_group_id` - Group whose inputs are considered
/// * `strategy` - Relationship an input must have with a unit to be bound
/// * `default_path` - Stored on every new binding
///
/// # Returns
/// Number of bindings created; zero is not an error
pub fn associate_inputs(
    conn: &Connection,
    work_unit_ids: &[i64],
    input_group_id: i64,
    strategy: AssociationStrategy,
    default_path: Option<&str>,
) -> Result<usize> {
    let sql = format!(
        "INSERT INTO input_bindings (work_unit_id, input_id, default_path)
         SELECT wu.id, i.id, ?2
         FROM work_units AS wu
         CROSS JOIN inputs AS i
         WHERE i.input_group_id = ?1 AND {} AND wu.id IN ({})",
        strategy.predicate(),
        id_list(3)
    );

    let tx = conn.unchecked_transaction()?;
    let created = tx
        .execute(&sql, with_ids(&[&input_group_id, &default_path], work_unit_ids))
        .with_context(|| format!(
            "Failed to associate input group {} using {:?}",
            input_group_id, strategy
        ))?;
    tx.commit()?;

    log::info!(
        "Associated input group {} with {} work units using {:?}: {} bindings",
        input_group_id,
        work_unit_ids.len(),
        strategy,
        created
    );
    Ok(created)
}

/// [`associate_inputs`] for an untyped strategy code
///
/// An unknown code fails with [`crate::error::SapError::InvalidStrategy`] before
/// the datastore is touched.
pub fn associate_inputs_by_code(
    conn: &Connection,
    work_unit_ids: &[i64],
    input_group_id: i64,
    strategy_code: i64,
    default_path: Option<&str>,
) -> Result<usize> {
    let strategy = AssociationStrategy::try_from(strategy_code)?;
    associate_inputs(conn, work_unit_ids, input_group_id, strategy, default_path)
}

/// Remove input bindings of work units, optionally only those of one input group
pub fn clear_input_bindings(
    conn: &Connection,
    work_unit_ids: &[i64],
    input_group_id: Option<i64>,
) -> Result<usize> {
    let removed = match input_group_id {
        Some(group_id) => {
            let sql = format!(
                "DELETE FROM input_bindings
                 WHERE input_id IN (SELECT id FROM inputs WHERE input_group_id = ?1)
                   AND work_unit_id IN ({})",
                id_list(2)
            );
            conn.execute(&sql, with_ids(&[&group_id], work_unit_ids))
        }
        None => {
            let sql = format!(
                "DELETE FROM input_bindings WHERE work_unit_id IN ({})",
                id_list(1)
            );
            conn.execute(&sql, with_ids(&[], work_unit_ids))
        }
    }
    .context("Failed to clear input bindings")?;

    log::info!("Removed {} input bindings", removed);
    Ok(removed)
}
