//! Grep tool: recursive regex search over workspace files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};
use regex::Regex;

use crate::context::{ToolContext, looks_binary, optional_usize, required_str};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

pub struct GrepTool {
    ctx: Arc<ToolContext>,
}

impl GrepTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

/// One search over a directory tree.
struct Search<'a> {
    ctx: &'a ToolContext,
    regex: Regex,
    include: Option<glob::Pattern>,
    context: usize,
    max_matches: usize,
    lines: Vec<String>,
    shown: usize,
    total: usize,
}

impl Search<'_> {
    fn walk(&mut self, dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                    continue;
                }
                self.walk(&path);
            } else if file_type.is_file() {
                if let Some(pattern) = &self.include
                    && !pattern.matches(&name)
                {
                    continue;
                }
                self.search_file(&path);
            }
        }
    }

    fn search_file(&mut self, path: &Path) {
        let Ok(bytes) = fs::read(path) else {
            return;
        };
        if looks_binary(&bytes) {
            return;
        }
        let text = String::from_utf8_lossy(&bytes);
        let file_lines: Vec<&str> = text.lines().collect();
        let display = self.ctx.display(path);

        // Index just past the last line already printed for this file.
        let mut printed_to = 0usize;

        for (i, line) in file_lines.iter().enumerate() {
            if !self.regex.is_match(line) {
                continue;
            }
            self.total += 1;
            if self.shown >= self.max_matches {
                continue;
            }
            self.shown += 1;

            let start = i.saturating_sub(self.context).max(printed_to);
            if self.context > 0 && printed_to > 0 && start > printed_to {
                self.lines.push("--".into());
            }
            for (j, ctx_line) in file_lines.iter().enumerate().take(i).skip(start) {
                self.lines.push(format!("{display}-{}-{ctx_line}", j + 1));
            }
            self.lines.push(format!("{display}:{}:{line}", i + 1));
            printed_to = i + 1;

            // Trailing context is emitted lazily: the next match's leading
            // context covers it, otherwise it is flushed below.
            let end = (i + 1 + self.context).min(file_lines.len());
            let next_match = file_lines[i + 1..end]
                .iter()
                .position(|l| self.regex.is_match(l))
                .map(|p| i + 1 + p);
            let flush_to = next_match.unwrap_or(end);
            for (j, ctx_line) in file_lines.iter().enumerate().take(flush_to).skip(printed_to) {
                self.lines.push(format!("{display}-{}-{ctx_line}", j + 1));
            }
            printed_to = flush_to;
        }
    }

    fn render(self) -> String {
        let mut out = self.lines.join("\n");
        if self.total > self.shown {
            out.push_str(&format!("\n... {} more matches", self.total - self.shown));
        }
        out
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns matching lines as \
         path:line:text. Hidden directories, target/ and node_modules/ are skipped."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: workspace root)"
                },
                "include": {
                    "type": "string",
                    "description": "Only search files whose name matches this glob (e.g. '*.rs')"
                },
                "context": {
                    "type": "integer",
                    "description": "Lines of context to show around each match"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let pattern = required_str(&arguments, "pattern")?;
        let path = arguments["path"].as_str().unwrap_or(".");
        let context = optional_usize(&arguments, "context").unwrap_or(0);

        let regex = Regex::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid regex: {e}")))?;
        let include = arguments["include"]
            .as_str()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| ToolError::InvalidArguments(format!("Invalid include glob: {e}")))
            })
            .transpose()?;

        let target: PathBuf = self.ctx.resolve(self.name(), path)?;
        if !target.exists() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Path not found: {path}"),
            });
        }

        let ctx = self.ctx.clone();
        let output = tokio::task::spawn_blocking(move || {
            let max_matches = ctx.limits.max_results;
            let mut search = Search {
                ctx: &ctx,
                regex,
                include,
                context,
                max_matches,
                lines: Vec::new(),
                shown: 0,
                total: 0,
            };
            if target.is_file() {
                search.search_file(&target);
            } else {
                search.walk(&target);
            }
            (search.total, search.render())
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "grep".into(),
            reason: e.to_string(),
        })?;

        match output {
            (0, _) => Ok(ToolResult::success("No matches found.")),
            (_, text) => Ok(ToolResult::success(text)),
        }
    }
}
