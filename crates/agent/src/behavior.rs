//! The run contract shared by every agent behavior.

use crate::Agent;
use acore::{BoxFuture, InvocationContext, Message, Response};
use anyhow::Result;
use futures_core::Stream;
use futures_util::StreamExt;
use std::{collections::BTreeMap, pin::Pin, sync::Arc};

/// A borrowed stream of events.
pub type Events<'a> = Pin<Box<dyn Stream<Item = Result<Event>> + Send + 'a>>;

/// One item of a streaming run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// In-progress model output.
    Partial { author: String, response: Response },
    /// A completed turn, appended to the conversation.
    Message { author: String, message: Message },
    /// A request to terminate the enclosing loop.
    Exit { author: String },
}

impl Event {
    /// The agent that produced the event.
    pub fn author(&self) -> &str {
        match self {
            Event::Partial { author, .. } | Event::Message { author, .. } | Event::Exit { author } => {
                author
            }
        }
    }

    /// The completed turn, if this is one.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Event::Message { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Why a loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The iteration cap was reached.
    MaxIterations(usize),
    /// A child or the predicate asked to stop during this iteration.
    Signalled { iteration: usize },
}

/// The terminal result of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    /// The agent that ran.
    pub author: String,
    /// Incoming messages followed by the produced turns.
    pub history: Vec<Message>,
    /// Turns appended during the run, in order.
    pub produced: Vec<Message>,
    /// Per-branch results of a parallel run, keyed by child name.
    pub branches: BTreeMap<String, Output>,
    /// How a loop run stopped.
    pub stop: Option<Stop>,
    /// Whether an exit signal was raised.
    pub exit: bool,
}

impl Output {
    pub fn new(author: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            author: author.into(),
            history,
            ..Default::default()
        }
    }

    /// Record a produced turn.
    pub fn push(&mut self, message: Message) {
        self.history.push(message.clone());
        self.produced.push(message);
    }

    /// The last produced turn.
    pub fn last(&self) -> Option<&Message> {
        self.produced.last()
    }

    /// Text of the last produced turn, empty when nothing was produced.
    pub fn text(&self) -> String {
        self.last().map(Message::text).unwrap_or_default()
    }

    /// Drain an event stream into an output.
    pub async fn collect(
        author: impl Into<String>,
        history: Vec<Message>,
        mut events: Events<'_>,
    ) -> Result<Self> {
        let mut output = Self::new(author, history);
        while let Some(event) = events.next().await {
            match event? {
                Event::Message { message, .. } => output.push(message),
                Event::Exit { .. } => output.exit = true,
                Event::Partial { .. } => {}
            }
        }
        Ok(output)
    }
}

/// What an agent does when it runs.
///
/// Implementations stream their events; [`Behavior::run`] drains that
/// stream unless the behavior has a terminal result of its own to build.
pub trait Behavior: Send + Sync {
    /// Short name of the behavior, for logs.
    fn kind(&self) -> &'static str;

    /// Stream the events of one run of `agent`.
    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a>;

    /// Run `agent` to completion.
    fn run<'a>(
        &'a self,
        agent: &'a Arc<Agent>,
        ctx: InvocationContext,
    ) -> BoxFuture<'a, Result<Output>> {
        Box::pin(async move {
            let history = ctx.messages.clone();
            Output::collect(agent.name(), history, self.stream(agent, ctx)).await
        })
    }
}
