//! Run children one after another.

use crate::{Agent, Behavior, Event, Events};
use acore::InvocationContext;
use async_stream::try_stream;
use futures_util::StreamExt;
use std::sync::Arc;

/// Runs each child in order over the accumulated history.
///
/// Every child sees the incoming messages followed by the turns produced
/// by the children before it. A child failure ends the run with that
/// error. An exit signal from a child is forwarded and skips the
/// remaining children.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl Behavior for Sequential {
    fn kind(&self) -> &'static str {
        "sequential"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a> {
        Box::pin(try_stream! {
            let mut history = ctx.messages.clone();
            for child in agent.children() {
                let mut exit = false;
                let mut events = child.stream(ctx.fork(history.clone()));
                while let Some(event) = events.next().await {
                    let event = event.inspect_err(|err| {
                        tracing::error!("'{}' failed in '{}': {err:#}", child.name(), agent.name())
                    })?;
                    match &event {
                        Event::Message { message, .. } => history.push(message.clone()),
                        Event::Exit { .. } => exit = true,
                        Event::Partial { .. } => {}
                    }
                    yield event;
                }

                if exit {
                    tracing::debug!(
                        "'{}' stopped after '{}' signalled exit",
                        agent.name(),
                        child.name()
                    );
                    break;
                }
            }
        })
    }
}
