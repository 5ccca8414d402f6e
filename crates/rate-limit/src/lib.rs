//! In-memory target health tracking and request-quota limiting.
//!
//! Narrowed from the teacher's distributed Redis/deadpool/mini-moka
//! backend down to a single-process `dashmap`+`governor` implementation
//! (see DESIGN.md): RouteCodex runs as one process per spec §5, so a
//! shared external store buys nothing here.

pub mod health;
pub mod quota;

pub use health::{HealthTracker, TargetKey};
pub use quota::QuotaLimiter;
