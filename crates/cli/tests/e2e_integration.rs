//! End-to-end tests: agent loop, SSE chat client and real tools against a
//! mock chat endpoint.

use std::sync::Arc;

use loopwright_agent::{AgentEvent, AgentLoop, TurnOutcome};
use loopwright_core::message::Role;
use loopwright_providers::{ClientOptions, OpenAiCompatClient, StaticTokenSource};
use loopwright_security::{AuditLogger, AuditOutcome, PathGuard};
use loopwright_tools::{ToolContext, ToolExecutor, ToolLimits};
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── SSE helpers ──────────────────────────────────────────────────────────

fn sse(records: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for record in records {
        body.push_str(&format!("data: {record}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn text_record(text: &str) -> serde_json::Value {
    serde_json::json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
}

fn tool_records(id: &str, name: &str, args: &str) -> Vec<serde_json::Value> {
    let (head, tail) = args.split_at(args.len() / 2);
    vec![
        serde_json::json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": head}}
        ]}}]}),
        serde_json::json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": tail}}
        ]}, "finish_reason": "tool_calls"}]}),
    ]
}

async fn mount_rounds(server: &MockServer, rounds: Vec<String>) {
    for (i, body) in rounds.into_iter().enumerate() {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-e2e"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .up_to_n_times(1)
            .with_priority(i as u8 + 1)
            .mount(server)
            .await;
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    audit: Arc<AuditLogger>,
    agent: AgentLoop,
}

fn harness(server: &MockServer) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/lib.rs"), "pub fn answer() -> u32 { 41 }\n").unwrap();

    let guard = PathGuard::new(dir.path()).unwrap();
    let root = guard.root().to_path_buf();
    let audit = Arc::new(AuditLogger::new());
    let ctx = ToolContext::new(guard, ToolLimits::default(), audit.clone());
    let tools = Arc::new(ToolExecutor::new(Arc::new(ctx)));

    let client = OpenAiCompatClient::new(ClientOptions::new(server.uri())).unwrap();
    let agent = AgentLoop::new(
        Arc::new(client),
        Arc::new(StaticTokenSource::new("sk-e2e")),
        tools,
        "gpt-4o",
    );
    Harness {
        _dir: dir,
        root,
        audit,
        agent,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_then_answer() {
    let server = MockServer::start().await;
    let mut round_one = tool_records("call_ls", "list_directory", "{}");
    round_one.insert(0, text_record(""));
    mount_rounds(
        &server,
        vec![
            sse(&round_one),
            sse(&[text_record("You have "), text_record("README.md and src/.")]),
        ],
    )
    .await;

    let mut h = harness(&server);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = h.agent.send("list files", &tx).await;
    assert_eq!(outcome, TurnOutcome::Completed { rounds: 2 });

    let kinds: Vec<_> = drain(&mut rx).iter().map(AgentEvent::event_type).collect();
    assert_eq!(
        kinds,
        ["tool_start", "tool_result", "text_delta", "text_delta", "text_done", "done"]
    );

    let history = h.agent.history().messages();
    assert_eq!(history.len(), 5);
    assert_eq!(history[3].role, Role::Tool);
    assert_eq!(history[3].text(), "src/\nREADME.md");
    assert_eq!(history[4].text(), "You have README.md and src/.");

    // The second request carried the tool result back.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(body["messages"][3]["role"], "tool");
    assert_eq!(body["messages"][3]["tool_call_id"], "call_ls");
    assert!(body["messages"][2]["content"].is_null());
    assert_eq!(body["stream"], true);
    assert_eq!(body["tool_choice"], "auto");
}

#[tokio::test]
async fn edit_through_the_loop() {
    let server = MockServer::start().await;
    let args = r#"{"path":"src/lib.rs","old_string":"41","new_string":"42"}"#;
    mount_rounds(
        &server,
        vec![
            sse(&tool_records("call_edit", "edit_file", args)),
            sse(&[text_record("Fixed the answer.")]),
        ],
    )
    .await;

    let mut h = harness(&server);
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.agent.send("make the answer 42", &tx).await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        AgentEvent::ToolResult { is_error: false, content, .. } if content == "Edited src/lib.rs"
    )));
    assert_eq!(
        std::fs::read_to_string(h.root.join("src/lib.rs")).unwrap(),
        "pub fn answer() -> u32 { 42 }\n"
    );
}

#[tokio::test]
async fn escape_attempt_is_denied_and_audited() {
    let server = MockServer::start().await;
    mount_rounds(
        &server,
        vec![
            sse(&tool_records("call_w", "write_file", r#"{"path":"../outside.txt","content":"x"}"#)),
            sse(&[text_record("I cannot write there.")]),
        ],
    )
    .await;

    let mut h = harness(&server);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = h.agent.send("write outside", &tx).await;
    assert_eq!(outcome, TurnOutcome::Completed { rounds: 2 });

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolResult { is_error: true, .. })));
    assert!(!h.root.parent().unwrap().join("outside.txt").exists());
    assert!(!h.audit.entries_by_outcome(&AuditOutcome::Denied).is_empty());
}

#[tokio::test]
async fn server_error_ends_turn_with_error_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let mut h = harness(&server);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = h.agent.send("hello", &tx).await;

    assert!(matches!(outcome, TurnOutcome::Failed { .. }));
    match drain(&mut rx).as_slice() {
        [AgentEvent::Error { message }] => {
            assert!(message.contains("503"));
            assert!(message.contains("overloaded"));
        }
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(h.agent.history().len(), 2);
}
