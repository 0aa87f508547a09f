//! The model-backed leaf behavior.

use crate::{Agent, Behavior, Event, Events, delegate};
use acore::{
    EngineConfig, Error, FunctionCall, FunctionDeclaration, InvocationContext, Message, Request,
    RequestConfig, Response, Role, StreamingMode, Tool, ToolContext,
};
use anyhow::{Context, Result};
use async_stream::try_stream;
use futures_util::StreamExt;
use llm::{Connection, DEFAULT_BUFFER, Registry, Signal, subscribe};
use serde_json::Value;
use std::sync::Arc;

/// Talks to a model, runs the tools and children it calls, and feeds the
/// results back until the model answers without calling anything.
#[derive(Clone)]
pub struct LlmAgent {
    model: String,
    registry: Arc<Registry>,
    instruction: Option<String>,
    tools: Vec<Arc<dyn Tool>>,
    config: RequestConfig,
    max_rounds: Option<usize>,
    buffer: usize,
}

impl LlmAgent {
    /// A leaf for `model`, resolved through `registry` on every run.
    pub fn new(model: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            model: model.into(),
            registry,
            instruction: None,
            tools: Vec::new(),
            config: RequestConfig::default(),
            max_rounds: None,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// A leaf for the configured default model, request defaults, round
    /// cap and stream buffer.
    pub fn from_config(registry: Arc<Registry>, config: &EngineConfig) -> Result<Self> {
        let model = config
            .default_model
            .clone()
            .context("engine config has no default_model")?;
        Ok(Self {
            config: config.request.clone(),
            max_rounds: config.max_rounds,
            ..Self::new(model, registry)
        }
        .with_buffer(config.stream_buffer))
    }

    /// Set the system instruction sent before the conversation.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Add a tool.
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Set the sampling parameters.
    pub fn config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    /// Cap the model calls of one turn.
    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    /// Capacity of the response streams this leaf reads. Zero is treated
    /// as one.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// The functions advertised to the model.
    pub fn declarations(&self, agent: &Agent, looping: bool) -> Vec<FunctionDeclaration> {
        let mut functions: Vec<_> = self.tools.iter().map(|tool| tool.declaration()).collect();
        functions.extend(agent.children().iter().map(|child| delegate::declaration(child)));
        if looping {
            functions.push(delegate::exit_loop());
        }
        functions
    }

    /// Build the request for the next model call.
    pub fn request(&self, agent: &Agent, history: &[Message], looping: bool) -> Request {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(instruction) = &self.instruction {
            messages.push(Message::system(instruction.as_str()));
        }
        messages.extend_from_slice(history);

        let config = self
            .config
            .clone()
            .with_functions(self.declarations(agent, looping));
        Request::new(messages).with_config(config)
    }

    /// Run one call and return its result text, or `None` for a loop exit.
    async fn dispatch(
        &self,
        agent: &Arc<Agent>,
        ctx: &InvocationContext,
        call: &FunctionCall,
    ) -> Result<Option<String>> {
        if ctx.looping && call.name == delegate::EXIT_LOOP {
            return Ok(None);
        }

        if let Some(tool) = self.tools.iter().find(|tool| tool.name() == call.name) {
            let args: Value = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments)
                    .with_context(|| format!("invalid arguments for tool '{}'", call.name))?
            };
            tracing::debug!("'{}' calling tool '{}'", agent.name(), call.name);
            let result = tool.invoke(args, ToolContext::new(ctx.clone())).await?;
            return Ok(Some(match result {
                Value::String(text) => text,
                other => other.to_string(),
            }));
        }

        if let Some(child) = agent.find_child(&call.name) {
            let input = delegate::extract_input(&call.arguments)?;
            tracing::debug!("'{}' delegating to '{}'", agent.name(), child.name());
            let mut child_ctx = ctx.fork(vec![Message::user(input)]);
            child_ctx.looping = false;
            let output = child.run(child_ctx).await?;
            return Ok(Some(output.text()));
        }

        Err(Error::ToolNotFound {
            agent: agent.name().to_owned(),
            tool: call.name.clone(),
        }
        .into())
    }
}

/// Closes a connection when the turn that opened it is done.
struct Closing(Box<dyn Connection>);

impl Drop for Closing {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Behavior for LlmAgent {
    fn kind(&self) -> &'static str {
        "llm"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a> {
        Box::pin(try_stream! {
            let author = agent.name().to_owned();
            let llm = self.registry.instantiate(&self.model)?;
            let mode = ctx.config.streaming_mode;
            let mut history = ctx.messages.clone();
            let mut rounds = 0;

            loop {
                if let Some(max) = self.max_rounds {
                    if rounds >= max {
                        Err::<(), _>(Error::MaxRounds { agent: author.clone(), rounds: max })?;
                    }
                }
                rounds += 1;

                let request = self.request(agent, &history, ctx.looping);
                tracing::debug!(
                    "'{author}' calling {} (round {rounds}, {mode:?}, invocation {})",
                    self.model,
                    ctx.invocation_id
                );

                let mut last = None;
                let mut terminal = None;
                match mode {
                    StreamingMode::None => {
                        terminal = Some(
                            llm.generate(request, false)
                                .with_buffer(self.buffer)
                                .finish()
                                .await?,
                        );
                    }
                    StreamingMode::Sse => {
                        let mut responses = llm.generate(request, true).with_buffer(self.buffer);
                        while let Some(response) = responses.next().await {
                            let response = response?;
                            if !response.partial {
                                terminal = Some(response);
                                break;
                            }
                            yield Event::Partial { author: author.clone(), response: response.clone() };
                            last = Some(response);
                        }
                    }
                    StreamingMode::Bidi => {
                        // Only a trailing user turn is sent as text; tool results and
                        // instructions stay in the history the connection opens with.
                        let mut messages = request.messages;
                        let latest = if messages.last().is_some_and(|m| m.role == Role::User) {
                            messages.pop()
                        } else {
                            None
                        };
                        let connection =
                            Closing(llm.connect(Request::new(messages).with_config(request.config))?);
                        let mut signals = subscribe(connection.0.as_ref());
                        match latest {
                            Some(message) => connection.0.send(&message.text())?,
                            None => connection.0.respond()?,
                        }
                        while let Some(signal) = signals.recv().await {
                            match signal {
                                Signal::Response(response) if response.partial => {
                                    yield Event::Partial { author: author.clone(), response: response.clone() };
                                    last = Some(response);
                                }
                                Signal::Response(response) => {
                                    terminal = Some(response);
                                    break;
                                }
                                Signal::Error(err) => Err::<(), _>(err)?,
                                Signal::End => break,
                            }
                        }
                    }
                }

                let mut response: Response = terminal
                    .or(last)
                    .ok_or_else(|| Error::EmptyResponse { model: self.model.clone() })?;
                response.partial = false;

                let message = response.message();
                ctx.remember(&message);
                history.push(message.clone());
                yield Event::Message { author: author.clone(), message };

                let mut calls = Vec::new();
                if let Some(call) = response.function_call {
                    calls.push((None, call));
                }
                for call in response.tool_calls.unwrap_or_default() {
                    calls.push((Some(call.id), call.function));
                }
                if calls.is_empty() {
                    break;
                }

                let mut exit = false;
                for (id, call) in calls {
                    let content = match self.dispatch(agent, &ctx, &call).await? {
                        Some(content) => content,
                        None => {
                            exit = true;
                            String::new()
                        }
                    };
                    let message = match id {
                        Some(id) => Message::tool(content, id),
                        None => Message::function(call.name, content),
                    };
                    ctx.remember(&message);
                    history.push(message.clone());
                    yield Event::Message { author: author.clone(), message };
                }

                if exit {
                    tracing::debug!("'{author}' signalled loop exit");
                    yield Event::Exit { author: author.clone() };
                    break;
                }
            }
        })
    }
}
