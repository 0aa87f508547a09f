//! Duplex connection over streamed completions.

use crate::OpenAi;
use acore::{Message, Request, RequestConfig};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use llm::{Callbacks, Connection, Llm, OnEnd, OnError, OnResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{runtime::Handle, task::JoinHandle};

/// A conversation held open against a chat completions backend.
///
/// Every [`Connection::send`] appends a user turn and streams the reply on
/// a background task; [`Connection::respond`] streams a reply to the
/// history as it stands. Partials and the final response go to the response
/// callbacks, then the end callbacks fire. The final response is appended
/// to the connection's history for the next turn.
pub struct OpenAiConnection {
    adapter: OpenAi,
    config: RequestConfig,
    history: Arc<Mutex<Vec<Message>>>,
    callbacks: Arc<Callbacks>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OpenAiConnection {
    pub fn new(adapter: OpenAi, request: Request) -> Self {
        Self {
            adapter,
            config: request.config,
            history: Arc::new(Mutex::new(request.messages)),
            callbacks: Arc::new(Callbacks::default()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The conversation so far.
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().clone()
    }
}

impl Connection for OpenAiConnection {
    fn send(&self, text: &str) -> Result<()> {
        self.callbacks.ensure_active()?;
        self.history.lock().push(Message::user(text));
        self.respond()
    }

    fn respond(&self) -> Result<()> {
        self.callbacks.ensure_active()?;
        let runtime = Handle::try_current().context("duplex connections need a tokio runtime")?;

        let messages = self.history.lock().clone();
        let request = Request::new(messages).with_config(self.config.clone());
        let mut responses = self.adapter.generate(request, true);

        let callbacks = self.callbacks.clone();
        let history = self.history.clone();
        let model = self.adapter.model().to_owned();
        let task = runtime.spawn(async move {
            while let Some(next) = responses.next().await {
                match next {
                    Ok(response) => {
                        if !response.partial {
                            history.lock().push(response.message());
                        }
                        callbacks.response(response);
                    }
                    Err(err) => {
                        tracing::warn!("connection to {model} failed: {err:#}");
                        callbacks.error(&err);
                        return;
                    }
                }
            }
            callbacks.end();
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
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
        if !self.callbacks.close() {
            return;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::debug!("connection to {} closed", self.adapter.model());
    }

    fn is_active(&self) -> bool {
        self.callbacks.is_active()
    }
}

impl Drop for OpenAiConnection {
    fn drop(&mut self) {
        self.close();
    }
}
