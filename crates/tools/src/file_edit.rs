//! File edit tool: replace one exact, unique occurrence of a string.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

use crate::context::{ToolContext, io_failure, required_str};

pub struct FileEditTool {
    ctx: Arc<ToolContext>,
}

impl FileEditTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    fn failed(&self, reason: String) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        }
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. old_string must occur exactly once; \
         include enough surrounding lines to make it unique."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace root"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace; must be unique in the file"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let old_string = required_str(&arguments, "old_string")?;
        let new_string = required_str(&arguments, "new_string")?;

        if old_string.is_empty() {
            return Err(ToolError::InvalidArguments("'old_string' must not be empty".into()));
        }

        let resolved = self.ctx.resolve(self.name(), path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| io_failure(self.name(), path, e))?;

        match content.matches(old_string).count() {
            0 => Err(self.failed(format!("old_string not found in {path}"))),
            1 => {
                let updated = content.replacen(old_string, new_string, 1);
                tokio::fs::write(&resolved, updated)
                    .await
                    .map_err(|e| io_failure(self.name(), path, e))?;
                Ok(ToolResult::success(format!("Edited {path}")))
            }
            n => Err(self.failed(format!(
                "old_string is not unique in {path} ({n} occurrences); add surrounding context"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;

    fn args(path: &str, old: &str, new: &str) -> serde_json::Value {
        serde_json::json!({"path": path, "old_string": old, "new_string": new})
    }

    #[tokio::test]
    async fn edit_replaces_unique_occurrence_only() {
        let (dir, ctx) = context();
        let file = dir.path().join("main.rs");
        std::fs::write(&file, "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
        let tool = FileEditTool::new(ctx);

        let result = tool
            .execute(args("main.rs", "\"hi\"", "\"hello\""))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "fn main() {\n    println!(\"hello\");\n}\n"
        );

        // Re-applying the same edit finds nothing to replace.
        let err = tool
            .execute(args("main.rs", "\"hi\"", "\"hello\""))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn edit_refuses_ambiguous_target() {
        let (dir, ctx) = context();
        let file = dir.path().join("dup.txt");
        let original = "x = 1\nx = 1\nx = 1\n";
        std::fs::write(&file, original).unwrap();
        let tool = FileEditTool::new(ctx);

        let result: ToolResult = tool
            .execute(args("dup.txt", "x = 1", "x = 2"))
            .await
            .unwrap_err()
            .into();
        assert!(result.is_error);
        assert!(result.content.contains('3'));
        assert!(result.content.contains("not unique"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
    }

    #[tokio::test]
    async fn edit_missing_file() {
        let (_dir, ctx) = context();
        let tool = FileEditTool::new(ctx);
        let err = tool.execute(args("ghost.txt", "a", "b")).await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn edit_empty_old_string_rejected() {
        let (dir, ctx) = context();
        std::fs::write(dir.path().join("f.txt"), "abc").unwrap();
        let tool = FileEditTool::new(ctx);
        let err = tool.execute(args("f.txt", "", "z")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn edit_outside_root_denied() {
        let (_dir, ctx) = context();
        let tool = FileEditTool::new(ctx);
        let err = tool.execute(args("/etc/hosts", "localhost", "x")).await.unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }
}
