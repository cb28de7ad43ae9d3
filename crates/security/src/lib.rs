//! Security module for Loopwright: the tool-execution boundary.
//!
//! Provides:
//! - **Path confinement**: every path argument resolves inside one root
//! - **Command denylist**: destructive shell commands are refused unrun
//! - **Audit logging**: structured record of executions and refusals

pub mod audit;
pub mod command;
pub mod path;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, DEFAULT_RETAINED_ENTRIES, TracingSink};
pub use command::{check_command, CommandDenied};
pub use path::{PathGuard, PathValidationError};
