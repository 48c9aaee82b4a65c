//! Target fleet management: the registry of database endpoints, the
//! per-target connection pool manager, and system-catalog discovery.
//!
//! Pools are created lazily, cached per target, and never shared across
//! targets. The pool manager is an explicit, constructed component that is
//! injected wherever connections are needed.

pub mod dialect;
pub mod discovery;
pub mod pool;
pub mod registry;

pub use dialect::Dialect;
pub use discovery::Discovery;
pub use pool::PoolManager;
pub use registry::{Liveness, Target, TargetCategory, TargetRegistry};
