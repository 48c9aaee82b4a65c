//! Query lifecycle for Steward: classification, the approval state
//! machine, and approver assignment.
//!
//! Mutating statements walk a two-tier chain (team approver, then a
//! skip-level approver); read-only statements are approved at submit
//! time. All state changes go through the transition table, and each
//! approval accepts exactly one decision.

pub mod approver;
pub mod classify;
pub mod engine;
pub mod state;

pub use approver::{
    ApproverChain, ApproverPolicy, RoleBasedPolicy, StaticDirectory, TeamDerivedPolicy,
    UserDirectory,
};
pub use engine::WorkflowEngine;
