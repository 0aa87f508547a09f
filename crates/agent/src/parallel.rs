//! Run children concurrently.

use crate::{Agent, Behavior, Event, Events, Output};
use acore::{BoxFuture, EngineConfig, InvocationContext};
use anyhow::Result;
use async_stream::try_stream;
use futures_util::StreamExt;
use llm::DEFAULT_BUFFER;
use std::{collections::BTreeMap, sync::Arc};
use tokio::{sync::mpsc, task::JoinSet};

/// Runs every child at once, each on its own task and its own copy of the
/// incoming context.
///
/// Streamed events keep their order within a branch; branches interleave
/// freely. The first branch failure aborts every other branch, waits for
/// them to wind down and is then returned unchanged. Dropping the stream
/// aborts all branches.
#[derive(Debug, Clone, Copy)]
pub struct Parallel {
    buffer: usize,
}

impl Default for Parallel {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl Parallel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A parallel composite merging through `stream_buffer` slots.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_buffer(config.stream_buffer)
    }

    /// Capacity of the channel merging branch events. Zero is treated as
    /// one.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }
}

async fn cancel<T: 'static>(branches: &mut JoinSet<T>) {
    branches.abort_all();
    while branches.join_next().await.is_some() {}
}

impl Behavior for Parallel {
    fn kind(&self) -> &'static str {
        "parallel"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a> {
        let buffer = self.buffer;
        Box::pin(try_stream! {
            let children = agent.children();
            let (tx, mut rx) = mpsc::channel::<(usize, Result<Event>)>(buffer);
            let mut branches = JoinSet::new();
            for (index, child) in children.iter().cloned().enumerate() {
                let tx = tx.clone();
                let ctx = ctx.fork(ctx.messages.clone());
                branches.spawn(async move {
                    let mut events = child.stream(ctx);
                    while let Some(event) = events.next().await {
                        let failed = event.is_err();
                        if tx.send((index, event)).await.is_err() || failed {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            while let Some((index, event)) = rx.recv().await {
                match event {
                    Ok(event) => yield event,
                    Err(err) => {
                        tracing::error!(
                            "branch '{}' of '{}' failed, cancelling the rest: {err:#}",
                            children[index].name(),
                            agent.name()
                        );
                        cancel(&mut branches).await;
                        Err::<(), _>(err)?;
                    }
                }
            }

            while let Some(joined) = branches.join_next().await {
                if let Err(err) = joined {
                    cancel(&mut branches).await;
                    Err::<(), _>(anyhow::anyhow!("branch of '{}' panicked: {err}", agent.name()))?;
                }
            }
        })
    }

    fn run<'a>(
        &'a self,
        agent: &'a Arc<Agent>,
        ctx: InvocationContext,
    ) -> BoxFuture<'a, Result<Output>> {
        Box::pin(async move {
            let children = agent.children();
            let mut branches = JoinSet::new();
            for child in children.iter().cloned() {
                let ctx = ctx.fork(ctx.messages.clone());
                branches.spawn(async move {
                    let result = child.run(ctx).await;
                    (child.name().to_owned(), result)
                });
            }

            let mut results = BTreeMap::new();
            while let Some(joined) = branches.join_next().await {
                let (name, result) = match joined {
                    Ok(joined) => joined,
                    Err(err) => {
                        cancel(&mut branches).await;
                        anyhow::bail!("branch of '{}' panicked: {err}", agent.name());
                    }
                };

                match result {
                    Ok(output) => {
                        results.insert(name, output);
                    }
                    Err(err) => {
                        tracing::error!(
                            "branch '{name}' of '{}' failed, cancelling the rest: {err:#}",
                            agent.name()
                        );
                        cancel(&mut branches).await;
                        return Err(err);
                    }
                }
            }

            let mut output = Output::new(agent.name(), ctx.messages);
            for child in &children {
                if let Some(branch) = results.get(child.name()) {
                    for message in &branch.produced {
                        output.push(message.clone());
                    }
                    output.exit |= branch.exit;
                }
            }
            output.branches = results;
            Ok(output)
        })
    }
}
