//! Tests for the OpenAI adapter over a recorded transport.

use acore::{
    BoxFuture, Error, FunctionDeclaration, Message, Request, RequestConfig, Role,
};
use futures_util::StreamExt;
use llm::{Llm, Registry, Signal, subscribe};
use arbor_openai::{ChatRequest, ChunkStream, OpenAi, Transport};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Default)]
struct Recorded {
    bodies: Mutex<Vec<ChatRequest>>,
    completion: Value,
    chunks: Vec<Value>,
}

impl Transport for Recorded {
    fn complete(&self, body: ChatRequest) -> BoxFuture<'static, anyhow::Result<Value>> {
        self.bodies.lock().push(body);
        let reply = self.completion.clone();
        Box::pin(async move { Ok(reply) })
    }

    fn stream(&self, body: ChatRequest) -> ChunkStream {
        self.bodies.lock().push(body);
        Box::pin(futures_util::stream::iter(self.chunks.clone().into_iter().map(Ok)))
    }
}

fn adapter(transport: Recorded) -> (OpenAi, Arc<Recorded>) {
    let transport = Arc::new(transport);
    (OpenAi::new("gpt-4-turbo", transport.clone()), transport)
}

fn request() -> Request {
    Request::new(vec![Message::system("be brief"), Message::user("hi")])
}

#[tokio::test]
async fn defaults_fill_unset_parameters() {
    let (openai, transport) = adapter(Recorded {
        completion: json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]}),
        ..Default::default()
    });

    let config = RequestConfig {
        temperature: Some(0.1),
        ..Default::default()
    };
    openai
        .generate(request().with_config(config), false)
        .finish()
        .await
        .unwrap();

    let body = transport.bodies.lock()[0].clone();
    assert_eq!(body.model, "gpt-4-turbo");
    assert_eq!(body.temperature, Some(0.1));
    assert_eq!(body.top_p, Some(1.0));
    assert_eq!(body.frequency_penalty, Some(0.0));
    assert_eq!(body.presence_penalty, Some(0.0));
    assert_eq!(body.max_tokens, None);
    assert!(!body.stream);
    assert_eq!(body.messages[0].role, "system");
}

#[tokio::test]
async fn single_shot_decodes_first_choice() {
    let (openai, _) = adapter(Recorded {
        completion: json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "call_1", "type": "function",
                "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}}]
        }}]}),
        ..Default::default()
    });

    let responses: Vec<_> = openai.generate(request(), false).collect().await;
    assert_eq!(responses.len(), 1);
    let response = responses.into_iter().next().unwrap().unwrap();
    assert!(!response.partial);
    assert_eq!(response.role, Role::Assistant);
    assert!(response.content.is_none());
    let calls = response.tool_calls.clone().unwrap();
    assert_eq!(calls[0].function.name, "search");
    assert!(response.raw.is_some());
}

#[tokio::test]
async fn empty_choices_fail() {
    let (openai, _) = adapter(Recorded {
        completion: json!({"choices": []}),
        ..Default::default()
    });
    let err = openai.generate(request(), false).finish().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::EmptyResponse {
            model: "gpt-4-turbo".into()
        })
    );
}

#[tokio::test]
async fn streamed_tool_call_is_reconstructed() {
    let (openai, transport) = adapter(Recorded {
        chunks: vec![
            json!({"choices": [{"delta": {"role": "assistant", "tool_calls": [
                {"index": 0, "id": "call_1", "type": "function", "function": {"name": "search", "arguments": "{\"q\""}}
            ]}}]}),
            json!({"choices": []}),
            json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": ":\"rust\"}"}}
            ]}}]}),
        ],
        ..Default::default()
    });

    let responses: Vec<_> = openai
        .generate(request(), true)
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert!(transport.bodies.lock()[0].stream);

    // Two partials, then the final response.
    assert_eq!(responses.len(), 3);
    assert_eq!(
        responses[0].tool_calls.as_ref().unwrap()[0].function.arguments,
        "{\"q\""
    );
    let last = responses.last().unwrap();
    assert!(!last.partial);
    let calls = last.tool_calls.as_ref().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_1");
    assert_eq!(calls[0].function.arguments, "{\"q\":\"rust\"}");
}

#[tokio::test]
async fn functions_become_tools() {
    let (openai, _) = adapter(Recorded::default());
    let config = RequestConfig::default().with_functions(vec![FunctionDeclaration::new(
        "search",
        "search the web",
        schemars::schema_for!(String),
    )]);
    let body = openai.body(&request().with_config(config), false);
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value["tools"][0]["type"], "function");
    assert_eq!(value["tools"][0]["function"]["name"], "search");
}

#[test]
fn registers_supported_models() {
    let registry = Registry::new();
    arbor_openai::register(&registry, Arc::new(Recorded::default())).unwrap();

    assert_eq!(registry.patterns().len(), arbor_openai::SUPPORTED_MODELS.len());
    assert_eq!(registry.instantiate("gpt-3.5-turbo").unwrap().model(), "gpt-3.5-turbo");
    assert!(registry.resolve("gpt-4o-mini").is_some());
    assert!(registry.resolve("claude-3-opus").is_none());
}

#[tokio::test]
async fn connection_streams_turns_and_closes() {
    let (openai, transport) = adapter(Recorded {
        chunks: vec![
            json!({"choices": [{"delta": {"content": "he"}}]}),
            json!({"choices": [{"delta": {"content": "llo"}}]}),
        ],
        ..Default::default()
    });

    let connection = openai.connect(request()).unwrap();
    let mut signals = subscribe(connection.as_ref());
    connection.send("again").unwrap();

    let mut final_text = None;
    loop {
        match signals.recv().await.unwrap() {
            Signal::Response(response) if !response.partial => final_text = response.content,
            Signal::Response(_) => {}
            Signal::Error(err) => panic!("unexpected error: {err}"),
            Signal::End => break,
        }
    }
    assert_eq!(final_text.as_deref(), Some("hello"));
    assert_eq!(transport.bodies.lock()[0].messages.len(), 3);

    connection.close();
    assert!(!connection.is_active());
    let err = connection.send("more").unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::ConnectionClosed));
}

#[tokio::test]
async fn connection_responds_without_a_user_turn() {
    let (openai, transport) = adapter(Recorded {
        chunks: vec![json!({"choices": [{"delta": {"content": "5"}}]})],
        ..Default::default()
    });

    let connection = openai.connect(request()).unwrap();
    let mut signals = subscribe(connection.as_ref());
    connection.respond().unwrap();
    while !matches!(signals.recv().await.unwrap(), Signal::End) {}

    let sent = transport.bodies.lock()[0].messages.len();
    assert_eq!(sent, request().messages.len());
}

#[tokio::test]
async fn buffer_sizes_the_response_stream() {
    let (openai, _) = adapter(Recorded::default());
    let responses = openai.with_buffer(4).generate(request(), true);
    assert_eq!(responses.buffer(), 4);
}
