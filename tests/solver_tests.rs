//! Integration coverage for ReactSolver and SimpleSolver against a
//! hand-written mock Gateway, in the style of the wider ecosystem's
//! hand-rolled mock trait implementations for async integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use agentcore::chat_session::ChatSession;
use agentcore::config::SolverConfig;
use agentcore::error::{CoreError, ToolError};
use agentcore::gateway::Gateway;
use agentcore::message::{CompletionConfig, GatewayResponse, Message, ToolDefinition};
use agentcore::solver::{ReactSolver, SimpleSolver, SolverOutcome};
use agentcore::tool::{Tool, ToolRegistry, ToolResult};
use agentcore::Broker;

struct ScriptedGateway {
    generate_responses: StdMutex<VecDeque<Message>>,
    object_responses: StdMutex<VecDeque<Value>>,
}

impl ScriptedGateway {
    fn new(generate_responses: Vec<Message>, object_responses: Vec<Value>) -> Self {
        ScriptedGateway {
            generate_responses: StdMutex::new(generate_responses.into()),
            object_responses: StdMutex::new(object_responses.into()),
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn generate(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _config: &CompletionConfig,
    ) -> Result<GatewayResponse, CoreError> {
        let message = self
            .generate_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted gateway ran out of generate() responses");
        Ok(GatewayResponse { message, usage: None, thinking: None })
    }

    async fn generate_object(
        &self,
        _messages: &[Message],
        _schema: &Value,
        _config: &CompletionConfig,
    ) -> Result<Value, CoreError> {
        Ok(self
            .object_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted gateway ran out of generate_object() responses"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn broker_with(generate_responses: Vec<Message>, object_responses: Vec<Value>) -> Arc<Broker> {
    let gateway = Arc::new(ScriptedGateway::new(generate_responses, object_responses));
    Arc::new(Broker::new(gateway, Arc::new(ToolRegistry::new())))
}

struct Adder;

#[async_trait]
impl Tool for Adder {
    fn descriptor(&self) -> ToolDefinition {
        ToolDefinition {
            name: "add".to_string(),
            description: "Adds two numbers.".to_string(),
            parameters_schema: json!({"type": "object"}),
        }
    }

    async fn run(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let a = arguments["a"].as_i64().unwrap_or(0);
        let b = arguments["b"].as_i64().unwrap_or(0);
        Ok(ToolResult::success(json!(a + b)))
    }
}

#[tokio::test]
async fn react_solver_acts_then_finishes() {
    let broker = broker_with(
        vec![Message::assistant("the answer is 5")],
        vec![
            json!({
                "thought": "I should add 2 and 3",
                "decision": "act",
                "tool_name": "add",
                "tool_arguments": {"a": 2, "b": 3}
            }),
            json!({"thought": "I have the answer now", "decision": "finish"}),
        ],
    );
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(Adder)).await;
    let solver = ReactSolver::new(broker, tools, SolverConfig::default());
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("what is 2+3?", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Done(summary) => assert_eq!(summary, "the answer is 5"),
        other => panic!("expected Done, got {:?}", other),
    }
}

#[tokio::test]
async fn react_solver_refines_the_plan_before_acting() {
    let broker = broker_with(
        vec![Message::assistant("done, the file has been found")],
        vec![
            json!({
                "thought": "let me lay out the steps first",
                "plan_steps": ["locate the file", "read it"],
                "decision": "plan"
            }),
            json!({
                "thought": "now I will search",
                "decision": "act",
                "tool_name": "add",
                "tool_arguments": {"a": 1, "b": 1}
            }),
            json!({"thought": "that's everything", "decision": "finish"}),
        ],
    );
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(Adder)).await;
    let solver = ReactSolver::new(broker, tools, SolverConfig::default());
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("find and read the file", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Done(summary) => assert_eq!(summary, "done, the file has been found"),
        other => panic!("expected Done, got {:?}", other),
    }
}

#[tokio::test]
async fn react_solver_fails_on_unknown_tool() {
    let broker = broker_with(
        vec![],
        vec![json!({
            "thought": "I'll use a tool that doesn't exist",
            "decision": "act",
            "tool_name": "nonexistent",
            "tool_arguments": {}
        })],
    );
    let tools = Arc::new(ToolRegistry::new());
    let solver = ReactSolver::new(broker, tools, SolverConfig::default());
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("do something", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Failed(reason) => assert!(reason.contains("nonexistent")),
        other => panic!("expected Failed, got {:?}", other),
    }
}

struct AlwaysFails;

#[async_trait]
impl Tool for AlwaysFails {
    fn descriptor(&self) -> ToolDefinition {
        ToolDefinition {
            name: "flaky".to_string(),
            description: "Always reports failure.".to_string(),
            parameters_schema: json!({"type": "object"}),
        }
    }

    async fn run(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::failure("the flaky tool always fails"))
    }
}

#[tokio::test]
async fn react_solver_records_tool_failure_as_observation_and_continues() {
    let broker = broker_with(
        vec![Message::assistant("here's what happened")],
        vec![
            json!({
                "thought": "let's try the flaky tool",
                "decision": "act",
                "tool_name": "flaky",
                "tool_arguments": {}
            }),
            json!({"thought": "it failed, but I can still answer", "decision": "finish"}),
        ],
    );
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(AlwaysFails)).await;
    let solver = ReactSolver::new(broker, tools, SolverConfig::default());
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("try the flaky tool", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Done(summary) => assert_eq!(summary, "here's what happened"),
        other => panic!("expected Done despite the tool failure, got {:?}", other),
    }
}

#[tokio::test]
async fn react_solver_fails_when_iteration_cap_is_exceeded_while_acting() {
    let broker = broker_with(
        vec![],
        vec![
            json!({
                "thought": "acting once",
                "decision": "act",
                "tool_name": "add",
                "tool_arguments": {"a": 1, "b": 1}
            }),
            json!({
                "thought": "acting again",
                "decision": "act",
                "tool_name": "add",
                "tool_arguments": {"a": 1, "b": 1}
            }),
        ],
    );
    let tools = Arc::new(ToolRegistry::new());
    tools.register(Arc::new(Adder)).await;
    let config = SolverConfig { max_iterations: 2, ..SolverConfig::default() };
    let solver = ReactSolver::new(broker, tools, config);
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("keep acting forever", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Failed(reason) => assert!(reason.contains("exceeded max iterations")),
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn simple_solver_matches_standalone_done_token() {
    let broker = broker_with(vec![Message::assistant("Task is done.")], vec![]);
    let solver = SimpleSolver::new(broker, SolverConfig::default());
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("finish the task", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Done(text) => assert!(text.contains("done")),
        other => panic!("expected Done, got {:?}", other),
    }
}

#[tokio::test]
async fn simple_solver_does_not_false_positive_on_embedded_substrings() {
    // "undone" and "failed" must not trip the matcher; only a third,
    // standalone "done" response should end the loop.
    let broker = broker_with(
        vec![
            Message::assistant("the task remains undone"),
            Message::assistant("the previous attempt failed"),
            Message::assistant("now it is done"),
        ],
        vec![],
    );
    let config = SolverConfig {
        max_iterations: 5,
        ..SolverConfig::default()
    };
    let solver = SimpleSolver::new(broker, config);
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("finish the task", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::Done(text) => assert_eq!(text, "now it is done"),
        other => panic!("expected Done, got {:?}", other),
    }
}

#[tokio::test]
async fn simple_solver_always_issues_a_final_summary_on_exhaustion() {
    let config = SolverConfig {
        max_iterations: 2,
        call_timeout: std::time::Duration::from_secs(5),
    };
    let broker = broker_with(
        vec![
            Message::assistant("working on it"),
            Message::assistant("still working on it"),
            Message::assistant("final summary: partial progress"),
        ],
        vec![],
    );
    let solver = SimpleSolver::new(broker, config);
    let mut session = ChatSession::new("you are a helper", 8000);

    let outcome = solver.run("a goal that never resolves", &mut session).await.unwrap();
    match outcome {
        SolverOutcome::IterationsExhausted(text) => {
            assert!(text.contains("final summary"))
        }
        other => panic!("expected IterationsExhausted, got {:?}", other),
    }
}
