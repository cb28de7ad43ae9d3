//! `loopwright chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use loopwright_agent::{AgentEvent, AgentLoop, TurnOutcome};
use loopwright_config::AppConfig;
use loopwright_providers::{OpenAiCompatClient, token_source_from_config};
use loopwright_security::{AuditLogger, PathGuard};
use loopwright_tools::{ToolContext, ToolExecutor, ToolLimits};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Longest tool output line echoed to the terminal.
const PREVIEW_CHARS: usize = 120;

pub async fn run(
    message: Option<String>,
    model: Option<String>,
    workspace: Option<PathBuf>,
    mut attachments: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = model {
        config.model = model;
    }
    if let Some(workspace) = workspace {
        config.workspace_root = Some(workspace);
    }

    // Fail early with setup instructions
    if !config.has_credentials() {
        eprintln!();
        eprintln!("  ERROR: No credentials configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    LOOPWRIGHT_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add auth.api_key to {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No credentials found. See above for setup instructions.".into());
    }

    let mut agent = build_agent(&config)?;

    if let Some(msg) = message {
        let outcome = run_turn(&mut agent, msg, &attachments).await?;
        if let TurnOutcome::Failed { message } = outcome {
            return Err(message.into());
        }
        return Ok(());
    }

    println!();
    println!("  Loopwright: interactive mode");
    println!();
    println!("  Endpoint:   {}", config.api_url);
    println!("  Model:      {}", config.model);
    println!("  Workspace:  {}", config.resolved_workspace_root().display());
    println!();
    println!("  Ctrl+C cancels a running turn. /clear resets history, /model <id> switches model, /exit quits.");
    println!();

    let handle = agent.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_busy() {
                handle.cancel();
            } else {
                std::process::exit(130);
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "exit" => break,
            "/clear" => {
                agent.clear_history();
                println!("  (history cleared)");
                continue;
            }
            _ => {}
        }
        if let Some(model) = line.strip_prefix("/model ") {
            agent.set_model(model.trim());
            println!("  (model set to {})", agent.model());
            continue;
        }

        println!();
        run_turn(&mut agent, line.to_string(), &std::mem::take(&mut attachments)).await?;
        println!();
    }

    println!();
    Ok(())
}

/// Wire the configured client, token source and tools into an agent.
fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let root = config.resolved_workspace_root();
    let guard = PathGuard::new(&root)?;
    let limits = ToolLimits {
        bash_timeout_secs: config.tools.bash_timeout_secs,
        max_output_bytes: config.tools.max_output_bytes,
        max_results: config.tools.max_results,
        read_default_limit: config.tools.read_default_limit,
    };
    let ctx = ToolContext::new(guard, limits, Arc::new(AuditLogger::tracing()));
    let tools = Arc::new(ToolExecutor::new(Arc::new(ctx)));

    let backend = Arc::new(OpenAiCompatClient::from_config(config)?);
    let tokens = token_source_from_config(config)?;
    debug!(root = %root.display(), model = %config.model, "Agent assembled");

    Ok(AgentLoop::new(backend, tokens, tools, config.model.clone()).with_config(config))
}

/// Run one turn, printing events as they arrive.
async fn run_turn(
    agent: &mut AgentLoop,
    text: String,
    attachments: &[String],
) -> Result<TurnOutcome, Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut renderer = Renderer::new(std::io::stdout());
        while let Some(event) = rx.recv().await {
            if renderer.render(&event).is_err() {
                break;
            }
        }
    });

    let outcome = agent.send_with_attachments(text, attachments, &tx).await;
    drop(tx);
    printer.await?;

    if outcome == TurnOutcome::Cancelled {
        println!("\n  (cancelled)");
    }
    Ok(outcome)
}

/// Terminal rendering of agent events.
pub struct Renderer<W: Write> {
    out: W,
    mid_line: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, mid_line: false }
    }

    pub fn render(&mut self, event: &AgentEvent) -> std::io::Result<()> {
        match event {
            AgentEvent::TextDelta { content } => {
                write!(self.out, "{content}")?;
                self.mid_line = !content.ends_with('\n');
            }
            AgentEvent::TextDone { .. } => self.end_line()?,
            AgentEvent::ToolStart { name, input, .. } => {
                self.end_line()?;
                writeln!(self.out, "  [{name}] {}", summarize_input(input))?;
            }
            AgentEvent::ToolInputProgress { .. } => {}
            AgentEvent::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                let status = if *is_error { "error" } else { "ok" };
                let lines = content.lines().count();
                let first = preview(content.lines().next().unwrap_or(""));
                if lines > 1 {
                    writeln!(self.out, "  [{name} {status}] {first} (+{} lines)", lines - 1)?;
                } else {
                    writeln!(self.out, "  [{name} {status}] {first}")?;
                }
            }
            AgentEvent::Error { message } => {
                self.end_line()?;
                writeln!(self.out, "  [error] {message}")?;
            }
            AgentEvent::Done { .. } => self.end_line()?,
        }
        self.out.flush()
    }

    fn end_line(&mut self) -> std::io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// The most telling argument of a tool call, for display.
fn summarize_input(input: &serde_json::Value) -> String {
    for key in ["command", "path", "pattern"] {
        if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
            return preview(value);
        }
    }
    String::new()
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
