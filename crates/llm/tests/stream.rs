//! Tests for streamed generation and call reconstruction.

use acore::{Error, FunctionCall, Request, Response, ToolCall};
use futures_util::StreamExt;
use arbor_llm::{Llm, ResponseStream, reconstruct, testing::{Scripted, Turn}};

fn request() -> Request {
    Request::new(vec![acore::Message::user("hi")])
}

#[tokio::test]
async fn streamed_text_ends_with_final() {
    let adapter = Scripted::new("gpt-4-test").chunks(&["he", "llo"]);
    let responses: Vec<Response> = adapter
        .generate(request(), true)
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(responses.len(), 3);
    assert!(responses[0].partial && responses[1].partial);
    assert_eq!(responses[1].content.as_deref(), Some("llo"));
    assert!(!responses[2].partial);
    assert_eq!(responses[2].content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn single_shot_yields_one_final() {
    let adapter = Scripted::new("gpt-4-test").chunks(&["he", "llo"]);
    let responses: Vec<_> = adapter.generate(request(), false).collect().await;
    assert_eq!(responses.len(), 1);
    let response = responses.into_iter().next().unwrap().unwrap();
    assert_eq!(response.content.as_deref(), Some("hello"));
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn function_call_grows_monotonically() {
    let chunks = vec![
        Response::call(FunctionCall::new("fo", "")).into_partial(),
        Response::call(FunctionCall::new("o", "{}")).into_partial(),
    ];
    let adapter = Scripted::new("m").turn(Turn::Chunks(chunks));
    let responses: Vec<Response> = adapter
        .generate(request(), true)
        .map(|r| r.unwrap())
        .collect()
        .await;

    let names: Vec<_> = responses
        .iter()
        .map(|r| r.function_call.as_ref().unwrap().name.clone())
        .collect();
    assert_eq!(names, vec!["fo", "foo", "foo"]);
    assert_eq!(responses[2].function_call.as_ref().unwrap().arguments, "{}");
}

#[tokio::test]
async fn interleaved_tool_calls_reconstruct_in_order() {
    let chunks = futures_util::stream::iter(vec![
        Ok(Response::calls(vec![ToolCall::new("a", "x", "1")]).into_partial()),
        Ok(Response::calls(vec![ToolCall::new("b", "y", "2")]).into_partial()),
        Ok(Response::calls(vec![ToolCall::new("a", "", "3")]).into_partial()),
    ]);
    let last = ResponseStream::new(reconstruct(chunks)).finish().await.unwrap();

    let calls = last.tool_calls.unwrap();
    assert_eq!(calls[0].id, "a");
    assert_eq!(calls[0].function.arguments, "13");
    assert_eq!(calls[1].id, "b");
    assert_eq!(calls[1].function.arguments, "2");
}

#[tokio::test]
async fn exhausted_script_fails_with_empty_response() {
    let adapter = Scripted::new("m");
    let err = adapter.generate(request(), false).finish().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::EmptyResponse { model: "m".into() })
    );
}

#[tokio::test]
async fn each_call_is_a_fresh_request() {
    let adapter = Scripted::new("m").text("one").text("two");
    let first = adapter.generate(request(), false).finish().await.unwrap();
    let second = adapter.generate(request(), false).finish().await.unwrap();
    assert_eq!(first.content.as_deref(), Some("one"));
    assert_eq!(second.content.as_deref(), Some("two"));
    assert_eq!(adapter.requests().len(), 2);
    assert_eq!(adapter.remaining(), 0);
}
