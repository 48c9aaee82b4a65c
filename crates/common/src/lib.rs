//! Common utilities, types, and configurations shared across Steward crates.
//!
//! This crate contains the base building blocks for the Steward system, including:
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Domain models**: Query records, approvals, results (`models`).
//! - **Authorization**: Caller identity and the authorization seam (`auth`).
//! - **Telemetry**: Observability setup (`telemetry`).
//! - **Logging**: Statement scrubbing for audit logs (`scrubber`).
pub mod auth;
pub mod config;
pub mod models;
pub mod scrubber;
pub mod telemetry;
