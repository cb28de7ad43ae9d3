//! Shared state handed to every built-in tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use loopwright_core::error::ToolError;
use loopwright_security::{AuditEvent, AuditLogger, AuditOutcome, PathGuard};

/// Bytes inspected when deciding whether a file is binary.
pub const BINARY_DETECTION_BYTES: usize = 8 * 1024;

/// Limits applied by the tools.
#[derive(Debug, Clone)]
pub struct ToolLimits {
    pub bash_timeout_secs: u64,
    pub max_output_bytes: usize,
    pub max_results: usize,
    pub read_default_limit: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            bash_timeout_secs: 30,
            max_output_bytes: 1024 * 1024,
            max_results: 200,
            read_default_limit: 2000,
        }
    }
}

/// Confinement root, limits, and audit log for one executor.
#[derive(Debug)]
pub struct ToolContext {
    pub guard: PathGuard,
    pub limits: ToolLimits,
    pub audit: Arc<AuditLogger>,
}

impl ToolContext {
    pub fn new(guard: PathGuard, limits: ToolLimits, audit: Arc<AuditLogger>) -> Self {
        Self { guard, limits, audit }
    }

    /// Resolve a path argument, auditing any escape attempt.
    pub fn resolve(&self, tool_name: &str, path: &str) -> Result<PathBuf, ToolError> {
        self.guard.resolve(path).map_err(|e| {
            self.audit.log(
                AuditEvent::PathDenied { tool_name: tool_name.into() },
                path,
                AuditOutcome::Denied,
                Some(e.to_string()),
            );
            ToolError::SandboxViolation(path.into())
        })
    }

    /// Path relative to the root, for output shown to the model.
    pub fn display(&self, path: &Path) -> String {
        self.guard.display_relative(path)
    }
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Fetch an optional non-negative integer argument.
pub fn optional_usize(args: &serde_json::Value, key: &str) -> Option<usize> {
    args[key].as_u64().map(|n| n as usize)
}

/// NUL byte in the leading block means binary.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_DETECTION_BYTES)].contains(&0)
}

/// Map an I/O error on `path` to a tool failure.
pub fn io_failure(tool_name: &str, path: &str, err: std::io::Error) -> ToolError {
    let reason = match err.kind() {
        std::io::ErrorKind::NotFound => format!("File not found: {path}"),
        _ => format!("{path}: {err}"),
    };
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A context rooted at a fresh temporary directory.
    pub fn context() -> (tempfile::TempDir, Arc<ToolContext>) {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        let ctx = ToolContext::new(guard, ToolLimits::default(), Arc::new(AuditLogger::new()));
        (dir, Arc::new(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_detection() {
        assert!(looks_binary(b"abc\0def"));
        assert!(!looks_binary(b"plain text"));
        let mut late_nul = vec![b'a'; BINARY_DETECTION_BYTES + 10];
        late_nul[BINARY_DETECTION_BYTES + 5] = 0;
        assert!(!looks_binary(&late_nul));
    }

    #[test]
    fn escape_is_audited() {
        let (_dir, ctx) = test_support::context();
        let err = ctx.resolve("read_file", "../outside.txt").unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert_eq!(ctx.audit.entries_by_outcome(&AuditOutcome::Denied).len(), 1);
    }

    #[test]
    fn missing_argument_is_invalid() {
        let args = serde_json::json!({});
        let err = required_str(&args, "path").unwrap_err();
        assert_eq!(err.to_string(), "Invalid tool arguments: Missing 'path' argument");
    }
}
