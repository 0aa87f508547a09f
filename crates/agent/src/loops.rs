//! Repeat children until told to stop.

use crate::{Agent, Behavior, Event, Events, Output, Stop};
use acore::{BoxFuture, InvocationContext, Message};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use std::{fmt, sync::Arc};

/// Decides from an iteration's produced messages whether to stop.
pub type Predicate = Arc<dyn Fn(&[Message]) -> bool + Send + Sync>;

enum Step {
    Event(Event),
    Stop(Stop),
}

/// Runs its children in order, over and over.
///
/// Each iteration sees the history left by the previous one. The loop
/// stops when a child signals exit, when the predicate accepts an
/// iteration's messages, or when the iteration cap is reached. None of
/// these is an error. The exit signal is consumed here and not forwarded.
#[derive(Clone, Default)]
pub struct Loop {
    max_iterations: Option<usize>,
    until: Option<Predicate>,
}

impl Loop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after `max` iterations.
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Stop once `predicate` accepts the messages of an iteration.
    pub fn until<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[Message]) -> bool + Send + Sync + 'static,
    {
        self.until = Some(Arc::new(predicate));
        self
    }

    fn steps<'a>(
        &'a self,
        agent: &'a Arc<Agent>,
        ctx: InvocationContext,
    ) -> impl Stream<Item = Result<Step>> + Send + 'a {
        try_stream! {
            let mut history = ctx.messages.clone();
            let mut iteration = 0;
            loop {
                if self.max_iterations.is_some_and(|max| iteration >= max) {
                    tracing::warn!(
                        "loop '{}' reached its cap of {iteration} iterations",
                        agent.name()
                    );
                    yield Step::Stop(Stop::MaxIterations(iteration));
                    break;
                }
                iteration += 1;

                let mut produced = Vec::new();
                let mut exit = false;
                for child in agent.children() {
                    let mut child_ctx = ctx.fork(history.clone());
                    child_ctx.looping = true;

                    let mut events = child.stream(child_ctx);
                    while let Some(event) = events.next().await {
                        let event = event.inspect_err(|err| {
                            tracing::error!(
                                "'{}' failed in iteration {iteration} of '{}': {err:#}",
                                child.name(),
                                agent.name()
                            )
                        })?;
                        match event {
                            Event::Exit { .. } => exit = true,
                            Event::Message { author, message } => {
                                history.push(message.clone());
                                produced.push(message.clone());
                                yield Step::Event(Event::Message { author, message });
                            }
                            partial => yield Step::Event(partial),
                        }
                    }

                    if exit {
                        break;
                    }
                }

                if exit || self.until.as_ref().is_some_and(|until| until(&produced)) {
                    tracing::debug!(
                        "loop '{}' signalled to stop in iteration {iteration}",
                        agent.name()
                    );
                    yield Step::Stop(Stop::Signalled { iteration });
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("max_iterations", &self.max_iterations)
            .field("until", &self.until.is_some())
            .finish()
    }
}

impl Behavior for Loop {
    fn kind(&self) -> &'static str {
        "loop"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a> {
        Box::pin(self.steps(agent, ctx).filter_map(|step| async move {
            match step {
                Ok(Step::Event(event)) => Some(Ok(event)),
                Ok(Step::Stop(_)) => None,
                Err(err) => Some(Err(err)),
            }
        }))
    }

    fn run<'a>(
        &'a self,
        agent: &'a Arc<Agent>,
        ctx: InvocationContext,
    ) -> BoxFuture<'a, Result<Output>> {
        Box::pin(async move {
            let mut output = Output::new(agent.name(), ctx.messages.clone());
            let mut steps = Box::pin(self.steps(agent, ctx));
            while let Some(step) = steps.next().await {
                match step? {
                    Step::Event(Event::Message { message, .. }) => output.push(message),
                    Step::Event(_) => {}
                    Step::Stop(stop) => output.stop = Some(stop),
                }
            }
            Ok(output)
        })
    }
}
