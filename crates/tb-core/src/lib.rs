//! tallyboard/crates/tb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Tallyboard:
//! models, storage and auth ports, and the pure ledger and milestone rules.

pub mod error;
pub mod ledger;
pub mod milestone;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use ledger::{MirrorChange, PostVote, VoteOutcome};
pub use milestone::{Milestone, PostStatus, THRESHOLDS};
pub use models::*;
pub use traits::*;
