//! Directory listing tool.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

use crate::context::{ToolContext, io_failure};

/// Content returned for a directory with no entries.
pub const EMPTY_DIRECTORY: &str = "(empty directory)";

pub struct ListDirectoryTool {
    ctx: Arc<ToolContext>,
}

impl ListDirectoryTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the immediate entries of a directory. Directories are shown first with a trailing '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let resolved = self.ctx.resolve(self.name(), path)?;

        let mut reader = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| io_failure(self.name(), path, e))?;

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_failure(self.name(), path, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => dirs.push(format!("{name}/")),
                _ => files.push(name),
            }
        }

        if dirs.is_empty() && files.is_empty() {
            return Ok(ToolResult::success(EMPTY_DIRECTORY));
        }

        dirs.sort();
        files.sort();
        dirs.extend(files);
        Ok(ToolResult::success(dirs.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;

    #[tokio::test]
    async fn directories_before_files() {
        let (dir, ctx) = context();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let tool = ListDirectoryTool::new(ctx);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result.content, "alpha/\nzeta/\na.txt\nb.txt");
    }

    #[tokio::test]
    async fn empty_directory_placeholder() {
        let (dir, ctx) = context();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let tool = ListDirectoryTool::new(ctx);
        let result = tool.execute(serde_json::json!({"path": "empty"})).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, EMPTY_DIRECTORY);
    }

    #[tokio::test]
    async fn missing_directory_is_error() {
        let (_dir, ctx) = context();
        let tool = ListDirectoryTool::new(ctx);
        assert!(tool.execute(serde_json::json!({"path": "nowhere"})).await.is_err());
    }

    #[tokio::test]
    async fn listing_outside_root_denied() {
        let (_dir, ctx) = context();
        let tool = ListDirectoryTool::new(ctx);
        let err = tool.execute(serde_json::json!({"path": ".."})).await.unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }
}
