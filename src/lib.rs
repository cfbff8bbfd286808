//! SAP Manager - production pipeline manager for geospatial mapping projects
//!
//! This library provides the core functionality for SAP Manager, including:
//! - Database operations, migrations and spatial SQL functions
//! - Data models for the production structure, work units, inputs and catalog
//! - Repository layer for data access
//! - The stage graph manager (review cycles, activities, work-unit copies)
//! - The input association engine
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use sap::db::DbConnection;
//! use sap::pipeline::create_review_cycle;
//!
//! fn main() -> anyhow::Result<()> {
//!     let conn = DbConnection::connect()?;
//!     for assignment in create_review_cycle(&conn, &[7])? {
//!         println!("{:?}", assignment);
//!     }
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod association;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod models;
pub mod pipeline;
pub mod repo;
pub mod spatial;
