//! Scripted adapters for tests.
//!
//! [`Scripted`] replays a queue of canned [`Turn`]s, one per request, and
//! records every request it receives. Clones share the same script, so a
//! test can hand one clone to a registry factory and inspect another.

use crate::{
    Accumulator, Callbacks, Connection, Llm, OnEnd, OnError, OnResponse, ResponseStream,
    reconstruct,
};
use acore::{Error, Message, Request, Response, ToolCall};
use anyhow::Result;
use async_stream::try_stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

/// One scripted backend turn.
#[derive(Debug, Clone)]
pub enum Turn {
    /// A single final response.
    Reply(Response),
    /// Partial chunks, reconstructed like a real stream.
    Chunks(Vec<Response>),
    /// A backend failure.
    Fail(String),
}

struct Inner {
    model: String,
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<Request>>,
}

/// An adapter that replays a script.
#[derive(Clone)]
pub struct Scripted {
    inner: Arc<Inner>,
}

impl Scripted {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                model: model.into(),
                turns: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a turn.
    pub fn turn(self, turn: Turn) -> Self {
        self.inner.turns.lock().push_back(turn);
        self
    }

    /// Queue a final text reply.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.turn(Turn::Reply(Response::text(text)))
    }

    /// Queue a single tool call.
    pub fn tool(self, id: &str, name: &str, arguments: &str) -> Self {
        self.turn(Turn::Reply(Response::calls(vec![ToolCall::new(
            id, name, arguments,
        )])))
    }

    /// Queue a streamed reply split into the given text chunks.
    pub fn chunks(self, chunks: &[&str]) -> Self {
        let chunks = chunks.iter().map(|c| Response::chunk(*c)).collect();
        self.turn(Turn::Chunks(chunks))
    }

    /// Queue a backend failure.
    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.turn(Turn::Fail(reason.into()))
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Turns not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.turns.lock().len()
    }

    /// A registry factory that hands out clones of this adapter.
    pub fn factory(&self) -> impl Fn(&str) -> Result<Arc<dyn Llm>> + Send + Sync + 'static {
        let scripted = self.clone();
        move |_model: &str| Ok(Arc::new(scripted.clone()) as Arc<dyn Llm>)
    }

    fn next_turn(&self, request: Request) -> Option<Turn> {
        self.inner.requests.lock().push(request);
        self.inner.turns.lock().pop_front()
    }
}

impl Llm for Scripted {
    fn model(&self) -> &str {
        &self.inner.model
    }

    fn generate(&self, request: Request, stream: bool) -> ResponseStream {
        let turn = self.next_turn(request);
        let model = self.inner.model.clone();

        let chunks = try_stream! {
            match turn {
                Some(Turn::Reply(response)) => {
                    yield response;
                }
                Some(Turn::Chunks(chunks)) => {
                    for chunk in chunks {
                        yield chunk.into_partial();
                    }
                }
                Some(Turn::Fail(reason)) => {
                    Err::<(), _>(anyhow::anyhow!(reason))?;
                }
                None => {
                    Err::<(), _>(Error::EmptyResponse { model })?;
                }
            }
        };

        let responses = reconstruct(chunks);
        if stream {
            return ResponseStream::new(responses);
        }

        ResponseStream::new(try_stream! {
            let mut responses = Box::pin(responses);
            while let Some(response) = responses.next().await {
                let response = response?;
                if !response.partial {
                    yield response;
                }
            }
        })
    }

    fn connect(&self, request: Request) -> Result<Box<dyn Connection>> {
        Ok(Box::new(ScriptedConnection {
            scripted: self.clone(),
            history: Mutex::new(request.messages.clone()),
            request,
            callbacks: Callbacks::default(),
        }))
    }
}

/// A duplex connection over a [`Scripted`] adapter.
///
/// Each [`Connection::send`] or [`Connection::respond`] consumes one turn
/// and delivers its responses synchronously through the registered
/// callbacks, followed by an end signal. An exhausted script only signals
/// the end.
pub struct ScriptedConnection {
    scripted: Scripted,
    request: Request,
    history: Mutex<Vec<Message>>,
    callbacks: Callbacks,
}

impl Connection for ScriptedConnection {
    fn send(&self, text: &str) -> Result<()> {
        self.callbacks.ensure_active()?;
        self.history.lock().push(Message::user(text));
        self.respond()
    }

    fn respond(&self) -> Result<()> {
        self.callbacks.ensure_active()?;

        let messages = self.history.lock().clone();
        let request = Request::new(messages).with_config(self.request.config.clone());

        match self.scripted.next_turn(request) {
            Some(Turn::Reply(response)) => {
                self.history.lock().push(response.message());
                self.callbacks.response(response);
                self.callbacks.end();
            }
            Some(Turn::Chunks(chunks)) => {
                let mut acc = Accumulator::default();
                for chunk in chunks {
                    self.callbacks.response(acc.accept(chunk.into_partial()));
                }
                let response = acc.finish();
                self.history.lock().push(response.message());
                self.callbacks.response(response);
                self.callbacks.end();
            }
            Some(Turn::Fail(reason)) => self.callbacks.error(&anyhow::anyhow!(reason)),
            None => self.callbacks.end(),
        }
        Ok(())
    }

    fn on_response(&self, callback: OnResponse) {
        self.callbacks.add_response(callback);
    }

    fn on_error(&self, callback: OnError) {
        self.callbacks.add_error(callback);
    }

    fn on_end(&self, callback: OnEnd) {
        self.callbacks.add_end(callback);
    }

    fn close(&self) {
        if self.callbacks.close() {
            tracing::debug!("scripted connection for {} closed", self.scripted.model());
        }
    }

    fn is_active(&self) -> bool {
        self.callbacks.is_active()
    }
}
