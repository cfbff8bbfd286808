//! Current actor for owner stamping.
//!
//! The acting user is resolved once per request and passed explicitly to every
//! create/update that stamps `owner`.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use crate::error::SapError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    /// Rank abbreviation and nickname, e.g. "Sgt Silva"
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// Resolves a user id into an [`Actor`]
pub trait ActorResolver {
    fn resolve(&self, user_id: i64) -> Result<Actor>;
}

/// Resolver backed by the `users` table
pub struct DbActorResolver<'a> {
    conn: &'a Connection,
}

impl<'a> DbActorResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ActorResolver for DbActorResolver<'_> {
    fn resolve(&self, user_id: i64) -> Result<Actor> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT TRIM(rank_abbrev || ' ' || nickname) FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to look up user {}", user_id))?;

        match name {
            Some(display_name) => Ok(Actor::new(user_id, display_name)),
            None => Err(SapError::Validation(format!("User {} not found", user_id)).into()),
        }
    }
}
