//! Glob tool: find files by path pattern.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

use crate::context::{ToolContext, required_str};

pub struct GlobTool {
    ctx: Arc<ToolContext>,
}

impl GlobTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern such as 'src/**/*.rs'. \
         Paths are returned relative to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, relative to the search directory"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search from (default: workspace root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let pattern = required_str(&arguments, "pattern")?;
        let path = arguments["path"].as_str().unwrap_or(".");

        let pattern_path = std::path::Path::new(pattern);
        if pattern_path.is_absolute() {
            return Err(ToolError::InvalidArguments(
                "pattern must be relative to the search directory".into(),
            ));
        }
        if pattern_path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ToolError::SandboxViolation(pattern.into()));
        }

        let base = self.ctx.resolve(self.name(), path)?;
        let full_pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&base.to_string_lossy()),
            pattern
        );
        let entries = glob::glob(&full_pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob pattern: {e}")))?;

        let ctx = self.ctx.clone();
        let mut matched = tokio::task::spawn_blocking(move || {
            entries
                .flatten()
                // Symlinked entries may still point out of the root.
                .filter(|entry| {
                    entry
                        .canonicalize()
                        .is_ok_and(|c| c.starts_with(ctx.guard.root()))
                })
                .map(|entry| ctx.display(&entry))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "glob".into(),
            reason: e.to_string(),
        })?;

        if matched.is_empty() {
            return Ok(ToolResult::success("No files matched the pattern."));
        }

        matched.sort();
        let total = matched.len();
        matched.truncate(self.ctx.limits.max_results);
        let mut out = matched.join("\n");
        if total > matched.len() {
            out.push_str(&format!("\n... {} more files", total - matched.len()));
        }
        Ok(ToolResult::success(out))
    }
}
