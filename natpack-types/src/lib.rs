//! Shared DTOs for the natpack workspace.
//!
//! # Design constraints
//! - These types are printed as JSON by the CLI and written into run reports.
//! - Keep them free of I/O; resolution logic lives in `natpack-core`.
//! - Prefer adding optional fields over changing semantics.

pub mod artifact;
pub mod platform;
pub mod publish;
pub mod report;
pub mod stage;

/// Schema identifiers.
pub mod schema {
    pub const NATPACK_REPORT_V1: &str = "natpack.report.v1";
}
