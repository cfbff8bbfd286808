use rusqlite::Connection;
use crate::actor::Actor;
use crate::models::{LayerRule, RuleGroup};
use super::{ensure_ids_exist, guarded_delete, now_ts, require_id};
use anyhow::{Context, Result};

/// Attribute rule repository
pub struct RuleRepo;

/// Rule group repository
pub struct RuleGroupRepo;

impl RuleRepo {
    /// Rules with their group name
    pub fn list(conn: &Connection) -> Result<Vec<LayerRule>> {
        let mut stmt = conn.prepare(
            "SELECT r.id, r.rule_group_id, g.name, r.schema_name, r.layer, r.attribute,
                    r.rule, r.description, r.owner, r.updated_ts
             FROM layer_rules AS r
             INNER JOIN rule_groups AS g ON g.id = r.rule_group_id
             ORDER BY g.ordem, r.schema_name, r.layer, r.attribute"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LayerRule {
                id: row.get(0)?,
                rule_group_id: row.get(1)?,
                rule_group: row.get(2)?,
                schema_name: row.get(3)?,
                layer: row.get(4)?,
                attribute: row.get(5)?,
                rule: row.get(6)?,
                description: row.get(7)?,
                owner: row.get(8)?,
                updated_ts: row.get(9)?,
            })
        })?;

        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    pub fn create(conn: &Connection, rules: &[LayerRule], actor: &Actor) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        let mut ids = Vec::with_capacity(rules.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO layer_rules
                    (rule_group_id, schema_name, layer, attribute, rule, description, owner, updated_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            )?;
            for rule in rules {
                stmt.execute(rusqlite::params![
                    rule.rule_group_id,
                    rule.schema_name,
                    rule.layer,
                    rule.attribute,
                    rule.rule,
                    rule.description,
                    actor.display_name,
                    now,
                ])
                .with_context(|| format!(
                    "Failed to create rule on {}.{}.{}",
                    rule.schema_name, rule.layer, rule.attribute
                ))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, rules: &[LayerRule], actor: &Actor) -> Result<()> {
        let ids = rules
            .iter()
            .map(|r| require_id(r.id, "Rule"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "layer_rules", &ids, "The request contains rules that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        let now = now_ts();
        {
            let mut stmt = tx.prepare(
                "UPDATE layer_rules SET
                    rule_group_id = ?1, schema_name = ?2, layer = ?3, attribute = ?4, rule = ?5,
                    description = ?6, owner = ?7, updated_ts = ?8
                 WHERE id = ?9"
            )?;
            for (rule, id) in rules.iter().zip(&ids) {
                stmt.execute(rusqlite::params![
                    rule.rule_group_id,
                    rule.schema_name,
                    rule.layer,
                    rule.attribute,
                    rule.rule,
                    rule.description,
                    actor.display_name,
                    now,
                    id,
                ])
                .with_context(|| format!("Failed to update rule {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(conn, "layer_rules", ids, "The request contains rules that do not exist", &[])
    }
}

impl RuleGroupRepo {
    pub fn list(conn: &Connection) -> Result<Vec<RuleGroup>> {
        let mut stmt = conn.prepare("SELECT id, name, color_rgb, ordem FROM rule_groups ORDER BY ordem")?;
        let rows = stmt.query_map([], |row| {
            Ok(RuleGroup {
                id: row.get(0)?,
                name: row.get(1)?,
                color_rgb: row.get(2)?,
                ordem: row.get(3)?,
            })
        })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    pub fn create(conn: &Connection, groups: &[RuleGroup]) -> Result<Vec<i64>> {
        let tx = conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(groups.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO rule_groups (name, color_rgb, ordem) VALUES (?1, ?2, ?3)"
            )?;
            for group in groups {
                stmt.execute(rusqlite::params![group.name, group.color_rgb, group.ordem])
                    .with_context(|| format!("Failed to create rule group '{}'", group.name))?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn update(conn: &Connection, groups: &[RuleGroup]) -> Result<()> {
        let ids = groups
            .iter()
            .map(|g| require_id(g.id, "Rule group"))
            .collect::<Result<Vec<_>>>()?;
        ensure_ids_exist(conn, "rule_groups", &ids, "The request contains rule groups that do not exist")?;

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE rule_groups SET name = ?1, color_rgb = ?2, ordem = ?3 WHERE id = ?4"
            )?;
            for (group, id) in groups.iter().zip(&ids) {
                stmt.execute(rusqlite::params![group.name, group.color_rgb, group.ordem, id])
                    .with_context(|| format!("Failed to update rule group {}", id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete rule groups that no rule profile or rule references
    pub fn delete(conn: &Connection, ids: &[i64]) -> Result<usize> {
        guarded_delete(
            conn,
            "rule_groups",
            ids,
            "The request contains rule groups that do not exist",
            &[
                ("rule_profiles", "rule_group_id", "Rule groups referenced by rule profiles cannot be deleted"),
                ("layer_rules", "rule_group_id", "Rule groups that still have rules cannot be deleted"),
            ],
        )
    }
}
