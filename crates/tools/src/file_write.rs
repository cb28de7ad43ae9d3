//! File write tool: create or fully overwrite a file.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

use crate::context::{ToolContext, io_failure, required_str};

pub struct FileWriteTool {
    ctx: Arc<ToolContext>,
}

impl FileWriteTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file inside the workspace, replacing it entirely. \
         Parent directories are created as needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = required_str(&arguments, "content")?;

        let resolved = self.ctx.resolve(self.name(), path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(self.name(), path, e))?;
        }

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| io_failure(self.name(), path, e))?;

        let lines = content.lines().count();
        tracing::debug!(path, lines, bytes = content.len(), "File written");
        Ok(ToolResult::success(format!("Wrote {lines} lines to {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;

    #[tokio::test]
    async fn write_reports_line_count() {
        let (dir, ctx) = context();
        let tool = FileWriteTool::new(ctx);

        let result = tool
            .execute(serde_json::json!({"path": "out.txt", "content": "a\nb\nc\n"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "Wrote 3 lines to out.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let (dir, ctx) = context();
        let tool = FileWriteTool::new(ctx);

        tool.execute(serde_json::json!({"path": "deep/nested/dir/f.rs", "content": "fn main() {}"}))
            .await
            .unwrap();
        assert!(dir.path().join("deep/nested/dir/f.rs").is_file());
    }

    #[tokio::test]
    async fn write_overwrites() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("f.txt"), "old content that is long").unwrap();
        let tool = FileWriteTool::new(ctx);

        tool.execute(serde_json::json!({"path": "f.txt", "content": "new"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn write_outside_root_creates_nothing() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let guard = loopwright_security::PathGuard::new(&root).unwrap();
        let ctx = Arc::new(ToolContext::new(guard, Default::default(), Default::default()));
        let tool = FileWriteTool::new(ctx);

        let err = tool
            .execute(serde_json::json!({"path": "../escaped/x.txt", "content": "pwned"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert!(!outer.path().join("escaped").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_through_dangling_link_denied() {
        let outside = tempfile::tempdir().unwrap();
        let (dir, ctx) = context();
        let target = outside.path().join("escaped.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let tool = FileWriteTool::new(ctx);
        let err = tool
            .execute(serde_json::json!({"path": "link", "content": "pwned"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn write_missing_content() {
        let (_dir, ctx) = context();
        let tool = FileWriteTool::new(ctx);
        let err = tool
            .execute(serde_json::json!({"path": "f.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
