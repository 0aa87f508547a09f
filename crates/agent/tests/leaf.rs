//! Tests for the model-backed leaf agent.

mod common;

use acore::{Error, InMemory, Memory, Role, RunConfig, StreamingMode};
use arbor_agent::{
    Agent, Event, FnTool, GoogleSearch, LlmAgent, Loop, Parallel, Sequential, Stop,
};
use common::{ask, registry, texts};
use futures_util::StreamExt;
use llm::{Registry, testing::Scripted};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(JsonSchema, Deserialize)]
struct Add {
    a: i64,
    b: i64,
}

fn add() -> FnTool {
    FnTool::typed("add", "add two numbers", |args: Add, _ctx| async move {
        Ok::<_, anyhow::Error>(json!(args.a + args.b))
    })
}

fn names(request: &acore::Request) -> Vec<String> {
    request
        .config
        .functions
        .iter()
        .map(|f| f.name.clone())
        .collect()
}

#[tokio::test]
async fn tool_result_feeds_the_next_call() {
    let scripted = Scripted::new("mock")
        .tool("call_1", "add", r#"{"a":2,"b":3}"#)
        .text("it is 5");
    let leaf = LlmAgent::new("mock", registry(&scripted))
        .instruction("You add numbers.")
        .tool(add());
    let agent = Agent::new("adder", leaf).unwrap();

    let output = agent.run(ask("2+3?")).await.unwrap();
    assert_eq!(output.produced.len(), 3);
    assert_eq!(output.produced[0].tool_calls[0].id, "call_1");
    assert_eq!(output.produced[1].role, Role::Tool);
    assert_eq!(output.produced[1].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(output.produced[1].text(), "5");
    assert_eq!(output.text(), "it is 5");

    let requests = scripted.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(names(&requests[0]), ["add"]);
    assert_eq!(texts(&requests[1].messages), ["You add numbers.", "2+3?", "", "5"]);
}

#[tokio::test]
async fn tool_values_are_stringified() {
    let scripted = Scripted::new("mock")
        .tool("s", "google_search", r#"{"query":"rust"}"#)
        .text("found it");
    let leaf = LlmAgent::new("mock", registry(&scripted)).tool(GoogleSearch);
    let agent = Agent::new("searcher", leaf).unwrap();

    let output = agent.run(ask("search rust")).await.unwrap();
    let result: serde_json::Value = serde_json::from_str(&output.produced[1].text()).unwrap();
    assert_eq!(result["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn children_are_called_as_functions() {
    let parent_model = Scripted::new("planner")
        .tool("c1", "helper", r#"{"input":"summarize this"}"#)
        .text("done");
    let child_model = Scripted::new("helper").text("a summary");

    let registry = Registry::new();
    registry.register("^planner$", parent_model.factory()).unwrap();
    registry.register("^helper$", child_model.factory()).unwrap();
    let registry = Arc::new(registry);

    let helper = Agent::builder("helper")
        .description("Summarizes text")
        .build(LlmAgent::new("helper", registry.clone()))
        .unwrap();
    let planner = Agent::builder("planner")
        .child(helper)
        .build(LlmAgent::new("planner", registry))
        .unwrap();

    let output = planner.run(ask("help me")).await.unwrap();
    assert_eq!(output.produced[1].text(), "a summary");
    assert_eq!(output.text(), "done");

    let declared = &parent_model.requests()[0].config.functions;
    assert_eq!(declared[0].name, "helper");
    assert_eq!(declared[0].description, "Summarizes text");
    assert_eq!(texts(&child_model.requests()[0].messages), ["summarize this"]);
}

#[tokio::test]
async fn unknown_function_is_an_error() {
    let scripted = Scripted::new("mock").tool("x", "missing", "{}");
    let agent = Agent::new("lonely", LlmAgent::new("mock", registry(&scripted))).unwrap();

    let err = agent.run(ask("go")).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::ToolNotFound {
            agent: "lonely".into(),
            tool: "missing".into(),
        })
    );
}

#[tokio::test]
async fn exit_loop_ends_the_enclosing_loop() {
    let scripted = Scripted::new("mock")
        .text("not yet")
        .tool("e", "exit_loop", "{}");
    let worker = Agent::new("worker", LlmAgent::new("mock", registry(&scripted))).unwrap();
    let root = Agent::builder("repeat")
        .child(worker)
        .build(Loop::new().max_iterations(5))
        .unwrap();

    let output = root.run(ask("work")).await.unwrap();
    assert_eq!(output.stop, Some(Stop::Signalled { iteration: 2 }));
    assert_eq!(scripted.calls(), 2);
    assert!(names(&scripted.requests()[0]).contains(&"exit_loop".to_owned()));
}

#[tokio::test]
async fn exit_loop_is_only_declared_inside_loops() {
    let scripted = Scripted::new("mock").text("hi");
    let root = Agent::builder("root")
        .child(Agent::new("leaf", LlmAgent::new("mock", registry(&scripted))).unwrap())
        .build(Sequential)
        .unwrap();

    root.run(ask("hi")).await.unwrap();
    assert!(names(&scripted.requests()[0]).is_empty());
}

#[tokio::test]
async fn sse_mode_streams_partials() {
    let scripted = Scripted::new("mock").chunks(&["Hel", "lo"]);
    let agent = Agent::new("talker", LlmAgent::new("mock", registry(&scripted))).unwrap();
    let ctx = ask("hi").config(RunConfig::streaming(StreamingMode::Sse));

    let events: Vec<_> = agent
        .run_streaming(ctx)
        .map(|event| event.unwrap())
        .collect()
        .await;
    let partials = events
        .iter()
        .filter(|event| matches!(event, Event::Partial { .. }))
        .count();
    assert_eq!(partials, 2);
    match events.last().unwrap() {
        Event::Message { author, message } => {
            assert_eq!(author, "talker");
            assert_eq!(message.text(), "Hello");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn bidi_mode_sends_the_latest_turn() {
    let scripted = Scripted::new("mock").chunks(&["hi ", "there"]);
    let agent = Agent::new("live", LlmAgent::new("mock", registry(&scripted))).unwrap();
    let ctx = ask("hello").config(RunConfig::streaming(StreamingMode::Bidi));

    let output = agent.run(ctx).await.unwrap();
    assert_eq!(output.text(), "hi there");
    assert_eq!(texts(&scripted.requests()[0].messages), ["hello"]);
}

#[tokio::test]
async fn bidi_mode_keeps_tool_results_in_the_history() {
    let scripted = Scripted::new("mock")
        .tool("call_1", "add", r#"{"a":2,"b":3}"#)
        .text("it is 5");
    let leaf = LlmAgent::new("mock", registry(&scripted))
        .instruction("You add numbers.")
        .tool(add());
    let agent = Agent::new("adder", leaf).unwrap();
    let ctx = ask("2+3?").config(RunConfig::streaming(StreamingMode::Bidi));

    let output = agent.run(ctx).await.unwrap();
    assert_eq!(output.text(), "it is 5");

    let requests = scripted.requests();
    assert_eq!(requests.len(), 2);
    let roles: Vec<_> = requests[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::Tool]);
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(last.text(), "5");
}

#[tokio::test]
async fn bidi_mode_without_a_user_turn_keeps_the_instruction() {
    let scripted = Scripted::new("mock").text("hello");
    let leaf = LlmAgent::new("mock", registry(&scripted)).instruction("Greet the user.");
    let agent = Agent::new("greeter", leaf).unwrap();
    let ctx = acore::InvocationContext::new(Vec::new())
        .config(RunConfig::streaming(StreamingMode::Bidi));

    agent.run(ctx).await.unwrap();
    let messages = &scripted.requests()[0].messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::System);
}

#[tokio::test]
async fn completed_turns_are_remembered() {
    let scripted = Scripted::new("mock")
        .tool("call_1", "add", r#"{"a":1,"b":1}"#)
        .text("2");
    let memory = Arc::new(InMemory::new());
    let agent = Agent::new("adder", LlmAgent::new("mock", registry(&scripted)).tool(add())).unwrap();
    let ctx = ask("1+1?").session("s1").memory(memory.clone());

    agent.run(ctx).await.unwrap();
    assert_eq!(memory.history("s1").len(), 3);
    assert!(memory.history("s2").is_empty());
}

#[tokio::test]
async fn max_rounds_caps_model_calls() {
    let scripted = Scripted::new("mock")
        .tool("call_1", "add", r#"{"a":1,"b":1}"#)
        .text("2");
    let leaf = LlmAgent::new("mock", registry(&scripted))
        .tool(add())
        .max_rounds(1);
    let agent = Agent::new("capped", leaf).unwrap();

    let err = agent.run(ask("1+1?")).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::MaxRounds {
            agent: "capped".into(),
            rounds: 1,
        })
    );
    assert_eq!(scripted.calls(), 1);
}

#[tokio::test]
async fn unresolved_model_fails_the_run() {
    let agent = Agent::new("orphan", LlmAgent::new("nobody", Arc::new(Registry::new()))).unwrap();
    let err = agent.run(ask("hi")).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::UnresolvedModel("nobody".into()))
    );
}

#[tokio::test]
async fn exhausted_backend_is_an_empty_response() {
    let scripted = Scripted::new("mock");
    let agent = Agent::new("quiet", LlmAgent::new("mock", registry(&scripted))).unwrap();
    let err = agent.run(ask("hi")).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::EmptyResponse { model: "mock".into() })
    );
}

#[test]
fn from_config_uses_the_default_model() {
    let config = acore::EngineConfig::from_toml(
        "default_model = \"gpt-4o\"\nmax_rounds = 4\nstream_buffer = 4\n[request]\ntemperature = 0.5\n",
    )
    .unwrap();
    let leaf = LlmAgent::from_config(Arc::new(Registry::new()), &config).unwrap();
    assert_eq!(leaf.model(), "gpt-4o");
    assert_eq!(leaf.buffer(), 4);
    assert_eq!(Parallel::from_config(&config).buffer(), 4);

    let empty = acore::EngineConfig::default();
    assert!(LlmAgent::from_config(Arc::new(Registry::new()), &empty).is_err());
}
