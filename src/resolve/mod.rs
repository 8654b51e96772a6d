// Resolution module
// Strategy selection and plan execution for reconciled trees

pub mod executor;
pub mod strategy;

pub use executor::{
    CopyReason, ItemOutcome, ItemStatus, PlannedCopy, PlannedDelete, ResolutionExecutor,
    SyncOutcome, SyncPlan,
};
pub use strategy::{
    conflict_variant_name, largest_winner, newest_winner, ManualDecision, ResolveStrategy, Side,
};
