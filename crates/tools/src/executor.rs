//! The tool executor: a total function from (name, arguments) to a result.

use std::sync::Arc;
use std::time::Instant;

use loopwright_core::provider::ToolDefinition;
use loopwright_core::tool::{ToolRegistry, ToolResult};
use loopwright_security::{AuditEvent, AuditLogger, AuditOutcome};
use tracing::{debug, info};

use crate::context::ToolContext;
use crate::{file_edit, file_read, file_write, glob_search, grep, list_dir, shell};

/// Runs named tools and never fails: every error becomes an error-flagged
/// [`ToolResult`].
pub struct ToolExecutor {
    registry: ToolRegistry,
    audit: Arc<AuditLogger>,
}

impl ToolExecutor {
    /// The seven built-in tools over `ctx`, in a fixed order.
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(file_read::FileReadTool::new(ctx.clone())));
        registry.register(Box::new(file_write::FileWriteTool::new(ctx.clone())));
        registry.register(Box::new(file_edit::FileEditTool::new(ctx.clone())));
        registry.register(Box::new(shell::ShellTool::new(ctx.clone())));
        registry.register(Box::new(grep::GrepTool::new(ctx.clone())));
        registry.register(Box::new(glob_search::GlobTool::new(ctx.clone())));
        registry.register(Box::new(list_dir::ListDirectoryTool::new(ctx.clone())));
        Self::from_registry(registry, ctx.audit.clone())
    }

    /// An executor over an arbitrary registry.
    pub fn from_registry(registry: ToolRegistry, audit: Arc<AuditLogger>) -> Self {
        Self { registry, audit }
    }

    /// Definitions for the request's `tools` array.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Execute `name` with `arguments`.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolResult {
        let target = audit_target(&arguments);
        let start = Instant::now();
        debug!(tool = name, target = %target, "Executing tool");

        let result = match self.registry.execute(name, arguments).await {
            Ok(result) => result,
            Err(err) => ToolResult::from(err),
        };

        let outcome = if result.is_error {
            AuditOutcome::Failure
        } else {
            AuditOutcome::Success
        };
        info!(
            tool = name,
            is_error = result.is_error,
            duration_ms = start.elapsed().as_millis() as u64,
            "Tool finished"
        );
        self.audit.log(
            AuditEvent::ToolExecution { tool_name: name.into() },
            &target,
            outcome,
            result.is_error.then(|| result.content.clone()),
        );
        result
    }
}

/// The argument that best identifies what a call acted on.
fn audit_target(arguments: &serde_json::Value) -> String {
    ["path", "command", "pattern"]
        .iter()
        .find_map(|key| arguments[*key].as_str())
        .unwrap_or(".")
        .to_string()
}
