//! Behaviors and helpers shared by the agent tests.

#![allow(dead_code)]

use acore::{InvocationContext, Message};
use arbor_agent::{Agent, Behavior, Event, Events};
use llm::{Registry, testing::Scripted};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Replies with the number of messages it was handed.
pub struct Echo;

impl Behavior for Echo {
    fn kind(&self) -> &'static str {
        "echo"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, ctx: InvocationContext) -> Events<'a> {
        let event = Event::Message {
            author: agent.name().to_owned(),
            message: Message::assistant(format!("saw {}", ctx.messages.len())),
        };
        Box::pin(futures_util::stream::once(async move { Ok(event) }))
    }
}

/// Fails with `error` after a short delay.
pub struct Fail(pub acore::Error);

impl Behavior for Fail {
    fn kind(&self) -> &'static str {
        "fail"
    }

    fn stream<'a>(&'a self, _agent: &'a Arc<Agent>, _ctx: InvocationContext) -> Events<'a> {
        let err = self.0.clone();
        Box::pin(futures_util::stream::once(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<Event, _>(anyhow::Error::from(err))
        }))
    }
}

/// Never finishes; counts how often it was started and dropped early.
#[derive(Default, Clone)]
pub struct Hang {
    pub started: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicUsize>,
}

struct Guard(Arc<AtomicUsize>);

impl Drop for Guard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Behavior for Hang {
    fn kind(&self) -> &'static str {
        "hang"
    }

    fn stream<'a>(&'a self, agent: &'a Arc<Agent>, _ctx: InvocationContext) -> Events<'a> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let guard = Guard(self.cancelled.clone());
        let author = agent.name().to_owned();
        Box::pin(futures_util::stream::once(async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, anyhow::Error>(Event::Exit { author })
        }))
    }
}

/// A registry serving every model from `scripted`.
pub fn registry(scripted: &Scripted) -> Arc<Registry> {
    let registry = Registry::new();
    registry.register(".*", scripted.factory()).unwrap();
    Arc::new(registry)
}

/// A context holding one user message.
pub fn ask(text: &str) -> InvocationContext {
    InvocationContext::new(vec![Message::user(text)])
}

/// Texts of the given messages.
pub fn texts(messages: &[Message]) -> Vec<String> {
    messages.iter().map(Message::text).collect()
}
