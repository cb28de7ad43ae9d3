//! File read tool: numbered slice of a text file.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

use crate::context::{ToolContext, io_failure, looks_binary, optional_usize, required_str};

pub struct FileReadTool {
    ctx: Arc<ToolContext>,
}

impl FileReadTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

/// Render lines `[offset, offset + limit)` (1-based) with line numbers.
fn render_slice(content: &str, offset: usize, limit: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    let start = offset.max(1) - 1;

    if start >= total && (total > 0 || start > 0) {
        return format!("(offset {offset} is past the end of the file, which has {total} lines)");
    }

    let end = start.saturating_add(limit).min(total);
    let mut out = lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{line}", start + i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    if end < total {
        out.push_str(&format!("\n... ({} more lines)", total - end));
    }
    out
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file inside the workspace. Returns lines prefixed with 1-based line numbers. \
         Use offset and limit to page through large files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line to start from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let offset = optional_usize(&arguments, "offset").unwrap_or(1);
        let limit = optional_usize(&arguments, "limit").unwrap_or(self.ctx.limits.read_default_limit);

        let resolved = self.ctx.resolve(self.name(), path)?;
        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| io_failure(self.name(), path, e))?;

        if looks_binary(&bytes) {
            return Ok(ToolResult::error(format!("Cannot read binary file: {path}")));
        }

        let content = String::from_utf8_lossy(&bytes);
        Ok(ToolResult::success(render_slice(&content, offset, limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use loopwright_core::tool::NO_OUTPUT;

    #[tokio::test]
    async fn read_numbers_lines() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma\n").unwrap();

        let tool = FileReadTool::new(ctx);
        let result = tool.execute(serde_json::json!({"path": "a.txt"})).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "     1\talpha\n     2\tbeta\n     3\tgamma");
    }

    #[tokio::test]
    async fn read_with_offset_and_limit() {
        let (dir, ctx) = context();
        let body: String = (1..=10).map(|i| format!("line{i}\n")).collect();
        std::fs::write(dir.path().join("many.txt"), body).unwrap();

        let tool = FileReadTool::new(ctx);
        let result = tool
            .execute(serde_json::json!({"path": "many.txt", "offset": 4, "limit": 2}))
            .await
            .unwrap();
        assert!(result.content.starts_with("     4\tline4\n     5\tline5"));
        assert!(result.content.ends_with("... (5 more lines)"));
    }

    #[tokio::test]
    async fn empty_file_uses_sentinel() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let tool = FileReadTool::new(ctx);
        let result = tool.execute(serde_json::json!({"path": "empty.txt"})).await.unwrap();
        assert_eq!(result.content, NO_OUTPUT);
    }

    #[tokio::test]
    async fn read_missing_file() {
        let (_dir, ctx) = context();
        let tool = FileReadTool::new(ctx);
        let err = tool
            .execute(serde_json::json!({"path": "nope.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found: nope.txt"));
    }

    #[tokio::test]
    async fn read_binary_refused() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 1, 2, 3]).unwrap();

        let tool = FileReadTool::new(ctx);
        let result = tool.execute(serde_json::json!({"path": "blob.bin"})).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn read_outside_root_denied() {
        let (_dir, ctx) = context();
        let tool = FileReadTool::new(ctx);
        let err = tool
            .execute(serde_json::json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }

    #[tokio::test]
    async fn empty_file_with_offset_reports_past_end() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let tool = FileReadTool::new(ctx);
        let result = tool
            .execute(serde_json::json!({"path": "empty.txt", "offset": 5}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("past the end"));
        assert!(result.content.contains("0 lines"));
    }

    #[test]
    fn offset_past_end() {
        let out = render_slice("one\ntwo\n", 9, 10);
        assert!(out.contains("past the end"));
    }
}
