//! Stage graph manager.
//!
//! Maintains the ordered stage pipeline of each subphase: review cycles,
//! activity assignment and work-unit copies. Every operation runs in a single
//! transaction and rolls back entirely on failure.

pub mod assignment;
pub mod review;

pub use assignment::{copy_work_units, create_activities, delete_activities};
pub use review::{
    create_review_correction_cycle, create_review_cycle, remove_review_cycle, ReviewAssignment, ReviewPair,
};
