//! Execution side of Steward: dry-run estimation, guarded execution,
//! and snapshot-based rollback.
//!
//! Nothing here changes workflow state except through the shared
//! transition table, and nothing here runs without its preconditions:
//! execution requires an approved record, rollback an executed one with
//! snapshot metadata. Statement introspection lives in [`extract`] and
//! is intentionally shallow; statements it cannot read simply lose
//! estimates or rollback capability rather than being misparsed.

pub mod estimator;
pub mod executor;
pub mod extract;
pub mod rollback;

pub use estimator::DryRunEstimator;
pub use executor::ExecutionEngine;
pub use rollback::RollbackEngine;
