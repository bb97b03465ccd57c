//! Turn controller scenarios against a scripted model.

use anyhow::{bail, Result};
use async_trait::async_trait;
use gemini_terminal::agent::history::validate_pairing;
use gemini_terminal::agent::{TurnController, TurnOutcome};
use gemini_terminal::config::AssistantConfig;
use gemini_terminal::error::CoreError;
use gemini_terminal::model::{Candidate, ChatSession, ModelClient, ModelResponse};
use gemini_terminal::tools::{Dispatcher, Tool, ToolContext, ToolRegistry};
use gemini_terminal::types::{Content, FunctionCallRequest, Message, Role, ToolResult};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Scripted model
// ---------------------------------------------------------------------------

enum Step {
    Reply(Result<ModelResponse, CoreError>),
    /// Never answers.
    Hang,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    sent: Vec<Message>,
    seeds: Vec<usize>,
}

#[derive(Clone, Default)]
struct ScriptedModel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedModel {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                steps: steps.into(),
                ..Script::default()
            })),
        }
    }

    fn sent(&self) -> Vec<Message> {
        self.script.lock().unwrap().sent.clone()
    }

    fn seeds(&self) -> Vec<usize> {
        self.script.lock().unwrap().seeds.clone()
    }
}

impl ModelClient for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn start_chat(&self, history: &[Message]) -> Box<dyn ChatSession> {
        self.script.lock().unwrap().seeds.push(history.len());
        Box::new(ScriptedChat {
            script: self.script.clone(),
        })
    }
}

struct ScriptedChat {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl ChatSession for ScriptedChat {
    async fn send_message(&mut self, message: &Message) -> Result<ModelResponse, CoreError> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.sent.push(message.clone());
            script.steps.pop_front()
        };
        match step {
            Some(Step::Reply(reply)) => reply,
            Some(Step::Hang) => std::future::pending().await,
            None => panic!("script exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Test tools
// ---------------------------------------------------------------------------

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the arguments"
    }
    fn usage(&self) -> &str {
        "echo <text>"
    }
    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        Ok(ToolResult::text(args))
    }
}

struct Broken;

#[async_trait]
impl Tool for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn usage(&self) -> &str {
        "broken"
    }
    async fn execute(&self, _ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        bail!("disk on fire")
    }
}

struct Slow;

#[async_trait]
impl Tool for Slow {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Sleeps for a minute"
    }
    fn usage(&self) -> &str {
        "slow"
    }
    async fn execute(&self, _ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolResult::text("done"))
    }
}

fn controller(model: &ScriptedModel, max_follow_ups: usize) -> TurnController {
    let mut registry = ToolRegistry::new();
    registry.register(Echo).unwrap();
    registry.register(Broken).unwrap();
    registry.register(Slow).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(registry), ToolContext::default());
    TurnController::new(Arc::new(model.clone()), dispatcher, max_follow_ups)
}

fn call(name: &str, args: Value) -> Step {
    let args: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
    Step::Reply(Ok(ModelResponse::function_call(FunctionCallRequest::new(name, args))))
}

fn text(t: &str) -> Step {
    Step::Reply(Ok(ModelResponse::text(t)))
}

fn roles(controller: &TurnController) -> Vec<Role> {
    controller.history().messages().iter().map(|m| m.role).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plain_text_reply() {
    let model = ScriptedModel::new(vec![text("Hello!")]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("hi", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Response { ref text, ref tool_calls } if text == "Hello!" && tool_calls.is_empty()));
    assert_eq!(roles(&ctl), vec![Role::User, Role::Model]);
    assert_eq!(model.seeds(), vec![0]);
}

#[tokio::test]
async fn chat_is_seeded_with_prior_history() {
    let model = ScriptedModel::new(vec![text("one"), text("two")]);
    let mut ctl = controller(&model, 1);
    let cancel = CancellationToken::new();

    ctl.run_turn("first", &cancel).await;
    ctl.run_turn("second", &cancel).await;
    assert_eq!(model.seeds(), vec![0, 2]);
    assert_eq!(ctl.history().user_message_count(), 2);
}

#[tokio::test]
async fn tool_call_then_text() {
    let model = ScriptedModel::new(vec![
        call("echo", json!({"args": "ping"})),
        text("The tool said ping."),
    ]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("use echo", &CancellationToken::new()).await;
    match outcome {
        TurnOutcome::Response { text, tool_calls } => {
            assert_eq!(text, "The tool said ping.");
            assert_eq!(tool_calls, vec!["echo".to_string()]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        roles(&ctl),
        vec![Role::User, Role::FunctionCall, Role::FunctionResult, Role::Model]
    );

    // The follow-up carries only the function result.
    let sent = model.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], Message::user("use echo"));
    match &sent[1].content {
        Content::FunctionResult(result) => {
            assert_eq!(result.name, "echo");
            assert_eq!(result.response["result"], "ping");
        }
        other => panic!("expected a function result, got {:?}", other),
    }
    assert!(validate_pairing(ctl.history().messages()).is_ok());
}

#[tokio::test]
async fn failing_tool_is_reported_to_the_model() {
    let model = ScriptedModel::new(vec![call("broken", json!({})), text("Sorry, that failed.")]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("break it", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Response { .. }));

    let messages = ctl.history().messages();
    match &messages[2].content {
        Content::FunctionResult(result) => {
            assert!(result.is_error());
            assert!(result.response["error"].as_str().unwrap().contains("disk on fire"));
        }
        other => panic!("expected a function result, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let model = ScriptedModel::new(vec![call("nope", json!({})), text("No such tool.")]);
    let mut ctl = controller(&model, 1);

    ctl.run_turn("x", &CancellationToken::new()).await;
    match &ctl.history().messages()[2].content {
        Content::FunctionResult(result) => {
            assert_eq!(result.response["error"], "tool not found: nope");
        }
        other => panic!("expected a function result, got {:?}", other),
    }
}

#[tokio::test]
async fn default_cap_runs_one_tool_per_turn() {
    let model = ScriptedModel::new(vec![
        call("echo", json!({"args": "a"})),
        call("echo", json!({"args": "b"})),
        call("echo", json!({"args": "c"})),
        text("never reached"),
    ]);
    let mut ctl = controller(&model, AssistantConfig::default().max_follow_ups);

    let outcome = ctl.run_turn("loop", &CancellationToken::new()).await;
    match outcome {
        TurnOutcome::Response { text, tool_calls } => {
            assert_eq!(tool_calls, vec!["echo".to_string()]);
            assert!(text.contains("'echo'"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        roles(&ctl),
        vec![Role::User, Role::FunctionCall, Role::FunctionResult, Role::Model]
    );
    // Only the user text and the single tool result reached the model.
    assert_eq!(model.sent().len(), 2);
    assert!(validate_pairing(ctl.history().messages()).is_ok());
}

#[tokio::test]
async fn larger_cap_allows_more_round_trips() {
    let model = ScriptedModel::new(vec![
        call("echo", json!({"args": "a"})),
        call("echo", json!({"args": "b"})),
        call("echo", json!({"args": "c"})),
    ]);
    let mut ctl = controller(&model, 2);

    let outcome = ctl.run_turn("loop", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Response { ref tool_calls, .. } if tool_calls.len() == 2));
    assert_eq!(
        roles(&ctl),
        vec![
            Role::User,
            Role::FunctionCall,
            Role::FunctionResult,
            Role::FunctionCall,
            Role::FunctionResult,
            Role::Model,
        ]
    );
    assert!(validate_pairing(ctl.history().messages()).is_ok());
}

#[tokio::test]
async fn zero_cap_runs_no_tools() {
    let model = ScriptedModel::new(vec![call("echo", json!({"args": "a"}))]);
    let mut ctl = controller(&model, 0);

    let outcome = ctl.run_turn("loop", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Response { ref tool_calls, .. } if tool_calls.is_empty()));
    assert_eq!(roles(&ctl), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn transport_error_fails_the_turn() {
    let model = ScriptedModel::new(vec![Step::Reply(Err(CoreError::Transport(
        "connection refused".into(),
    )))]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("hi", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Failed(CoreError::Transport(_))));
    // The user message stays; nothing is retried.
    assert_eq!(roles(&ctl), vec![Role::User]);
    assert_eq!(model.sent().len(), 1);
}

#[tokio::test]
async fn error_after_tool_keeps_the_pair() {
    let model = ScriptedModel::new(vec![
        call("echo", json!({"args": "a"})),
        Step::Reply(Err(CoreError::Transport("timeout".into()))),
    ]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("hi", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(
        roles(&ctl),
        vec![Role::User, Role::FunctionCall, Role::FunctionResult]
    );
    assert!(validate_pairing(ctl.history().messages()).is_ok());
}

#[tokio::test]
async fn prompt_block_is_synthesized() {
    let model = ScriptedModel::new(vec![Step::Reply(Ok(ModelResponse::blocked(
        "SAFETY",
        Some("contains unsafe content".into()),
    )))]);
    let mut ctl = controller(&model, 1);

    match ctl.run_turn("bad", &CancellationToken::new()).await {
        TurnOutcome::Response { text, .. } => {
            assert_eq!(text, "Request blocked: SAFETY\nDetails: contains unsafe content");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(roles(&ctl), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn unexpected_finish_reason_is_synthesized() {
    let response = ModelResponse {
        candidates: vec![Candidate {
            parts: vec![],
            finish_reason: Some("RECITATION".into()),
        }],
        ..ModelResponse::default()
    };
    let model = ScriptedModel::new(vec![Step::Reply(Ok(response))]);
    let mut ctl = controller(&model, 1);

    match ctl.run_turn("quote", &CancellationToken::new()).await {
        TurnOutcome::Response { text, .. } => {
            assert_eq!(text, "Model stopped unexpectedly. Finish reason: RECITATION");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn empty_response_is_malformed() {
    let model = ScriptedModel::new(vec![Step::Reply(Ok(ModelResponse::default()))]);
    let mut ctl = controller(&model, 1);

    let outcome = ctl.run_turn("hi", &CancellationToken::new()).await;
    assert!(matches!(outcome, TurnOutcome::Failed(CoreError::MalformedResponse(_))));
}

#[tokio::test]
async fn interrupt_during_tool_keeps_pairing() {
    let model = ScriptedModel::new(vec![call("slow", json!({}))]);
    let mut ctl = controller(&model, 1);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = ctl.run_turn("be slow", &cancel).await;
    assert!(matches!(outcome, TurnOutcome::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(10));

    let messages = ctl.history().messages();
    assert_eq!(
        roles(&ctl),
        vec![Role::User, Role::FunctionCall, Role::FunctionResult]
    );
    match &messages[2].content {
        Content::FunctionResult(result) => {
            assert_eq!(result.name, "slow");
            assert_eq!(result.response["error"], "interrupted by user");
        }
        other => panic!("expected a function result, got {:?}", other),
    }
    assert!(validate_pairing(messages).is_ok());
}

#[tokio::test]
async fn interrupt_during_model_request() {
    let model = ScriptedModel::new(vec![Step::Hang]);
    let mut ctl = controller(&model, 1);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = ctl.run_turn("hello?", &cancel).await;
    assert!(matches!(outcome, TurnOutcome::Interrupted));
    assert_eq!(roles(&ctl), vec![Role::User]);
}

#[tokio::test]
async fn summary_does_not_touch_history() {
    let model = ScriptedModel::new(vec![text("Hi there"), text("You said hi.")]);
    let mut ctl = controller(&model, 1);
    ctl.run_turn("hi", &CancellationToken::new()).await;

    let summary = ctl.summarize(Some("{\"project\":\"demo\"}")).await.unwrap();
    assert_eq!(summary, "You said hi.");
    assert_eq!(ctl.history().len(), 2);

    let sent = model.sent();
    let prompt = sent.last().and_then(Message::text).unwrap();
    assert!(prompt.starts_with("Current Context: {\"project\":\"demo\"}"));
    assert!(prompt.contains("user: hi..."));
    assert_eq!(model.seeds(), vec![0, 2]);
}
