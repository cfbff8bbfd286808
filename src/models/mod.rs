// Core data models for the production pipeline
// These structs represent the domain entities

pub mod pipeline;
pub mod activity;
pub mod work_unit;
pub mod input;
pub mod catalog;
pub mod profile;

pub use pipeline::*;
pub use activity::*;
pub use work_unit::*;
pub use input::*;
pub use catalog::*;
pub use profile::*;
