//! Streaming call reconstruction.
//!
//! Backends deliver function and tool calls as fragments spread across
//! chunks. The accumulator merges them so that every partial response
//! carries the full call state seen so far.

use acore::{FunctionCall, Response, Role, ToolCall};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use std::collections::HashMap;

/// Merges call fragments across the chunks of one stream.
#[derive(Debug, Default)]
pub struct Accumulator {
    content: String,
    function_call: Option<FunctionCall>,
    tool_calls: Vec<ToolCall>,
    index: HashMap<String, usize>,
}

impl Accumulator {
    /// Merge a chunk and return it with the cumulative call state.
    ///
    /// The chunk's own content is left as the delta it carried.
    pub fn accept(&mut self, mut chunk: Response) -> Response {
        if let Some(content) = &chunk.content {
            self.content.push_str(content);
        }

        if let Some(fragment) = chunk.function_call.take() {
            match &mut self.function_call {
                Some(call) => call.extend(&fragment),
                None => self.function_call = Some(fragment),
            }
        }

        for fragment in chunk.tool_calls.take().unwrap_or_default() {
            match self.index.get(&fragment.id) {
                Some(&at) => self.tool_calls[at].extend(&fragment),
                None => {
                    self.index.insert(fragment.id.clone(), self.tool_calls.len());
                    self.tool_calls.push(fragment);
                }
            }
        }

        chunk.function_call = self.function_call.clone();
        chunk.tool_calls = (!self.tool_calls.is_empty()).then(|| self.tool_calls.clone());
        chunk
    }

    /// The function call merged so far.
    pub fn function_call(&self) -> Option<&FunctionCall> {
        self.function_call.as_ref()
    }

    /// The tool calls merged so far, in first-seen order.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// The final response: all content and every merged call.
    pub fn finish(self) -> Response {
        Response {
            content: (!self.content.is_empty()).then_some(self.content),
            function_call: self.function_call,
            tool_calls: (!self.tool_calls.is_empty()).then_some(self.tool_calls),
            role: Role::Assistant,
            ..Default::default()
        }
    }
}

/// Run a chunk stream through an [`Accumulator`].
///
/// Partial chunks are yielded with the cumulative call state. If the
/// source yields a final response it is passed through unchanged and the
/// stream ends; otherwise the accumulated final response is yielded once
/// the source is exhausted.
pub fn reconstruct<S>(chunks: S) -> impl Stream<Item = Result<Response>> + Send
where
    S: Stream<Item = Result<Response>> + Send,
{
    try_stream! {
        let mut acc = Accumulator::default();
        let mut chunks = Box::pin(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if !chunk.partial {
                yield chunk;
                return;
            }
            yield acc.accept(chunk);
        }

        yield acc.finish();
    }
}
