//! Shell tool: run a command in the workspace root.
//!
//! Commands are screened against the denylist before anything is spawned,
//! run with a wall-clock timeout, and have their output capped.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};
use loopwright_security::{AuditEvent, AuditOutcome, check_command};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::{ToolContext, required_str};

/// Credential-bearing variables never passed to child processes.
pub const STRIPPED_ENV_VARS: &[&str] = &["LOOPWRIGHT_API_KEY", "LOOPWRIGHT_SECRET", "OPENAI_API_KEY"];

pub struct ShellTool {
    ctx: Arc<ToolContext>,
}

impl ShellTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };
        cmd.current_dir(self.ctx.guard.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in STRIPPED_ENV_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

/// Keep at most `max + 1` bytes of a pipe and discard the rest, so a chatty
/// command can still run to completion without growing memory.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, max: usize) -> std::io::Result<Vec<u8>> {
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };
    let mut kept = Vec::new();
    (&mut reader).take(max as u64 + 1).read_to_end(&mut kept).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(kept)
}

/// Truncate to at most `max` bytes on a char boundary, with a notice.
fn cap_output(output: String, max: usize) -> String {
    if output.len() <= max {
        return output;
    }
    let mut end = max;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... output truncated at {max} bytes", &output[..end])
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace root and return its combined output. \
         Commands time out after a fixed limit."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = required_str(&arguments, "command")?;

        if let Err(denied) = check_command(command) {
            self.ctx.audit.log(
                AuditEvent::CommandBlocked { reason: denied.reason.clone() },
                command,
                AuditOutcome::Denied,
                None,
            );
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: denied.to_string(),
            });
        }

        let timeout_secs = self.ctx.limits.bash_timeout_secs;
        debug!(command = %command, timeout_secs, "Executing shell command");

        let mut child = self.command(command).spawn().map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;

        let max_output = self.ctx.limits.max_output_bytes;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let collect = async {
            let (stdout, stderr) = tokio::try_join!(
                read_capped(stdout_pipe, max_output),
                read_capped(stderr_pipe, max_output)
            )?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        };

        let (status, stdout, stderr) = match tokio::time::timeout(Duration::from_secs(timeout_secs), collect).await {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, timeout_secs, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: self.name().into(),
                    timeout_secs,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);
        let mut text = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(stderr.trim_end());
        }
        let text = cap_output(text, max_output);

        if status.success() {
            Ok(ToolResult::success(text))
        } else {
            let code = status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(ToolResult::error(format!("[exit code: {code}]\n{text}").trim_end().to_string()))
        }
    }
}
