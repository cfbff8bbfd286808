pub mod commands;
pub mod error;

pub use commands::*;
pub use error::*;
