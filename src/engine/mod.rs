//! Resource allocation conflict detection and capacity reporting.
//!
//! Call flow: `AllocationManager` → `AllocationValidator` → `conflict::detect`
//! → `DateRange::overlaps`, all reading through `AllocationRepository`.
//! `UtilizationAggregator` reads the same repository independently.

pub mod conflict;
pub mod locks;
pub mod manager;
pub mod overlap;
pub mod utilization;
pub mod validator;

pub use conflict::{detect, ConflictScan};
pub use locks::ResourceLocks;
pub use manager::AllocationManager;
pub use overlap::DateRange;
pub use utilization::UtilizationAggregator;
pub use validator::AllocationValidator;
