//! The agent tree.
//!
//! An [`Agent`] owns its children and holds a non-owning back-reference to
//! its parent. The parent is set exactly once, by [`Agent::attach`], so an
//! agent belongs to at most one tree for its whole lifetime.

use crate::{Behavior, Event, Events, Output};
use acore::{Error, InvocationContext, USER};
use anyhow::Result;
use async_stream::try_stream;
use futures_util::StreamExt;
use llm::TaskStream;
use parking_lot::RwLock;
use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, OnceLock, Weak},
};
use tracing::Instrument;

struct Parent {
    name: String,
    agent: Weak<Agent>,
}

/// A named node of an execution tree.
pub struct Agent {
    name: String,
    description: String,
    behavior: Box<dyn Behavior>,
    parent: OnceLock<Parent>,
    children: RwLock<Vec<Arc<Agent>>>,
}

impl Agent {
    /// Create a parentless agent with no children.
    pub fn new(name: impl Into<String>, behavior: impl Behavior + 'static) -> Result<Arc<Self>> {
        Self::builder(name).build(behavior)
    }

    /// Start building an agent.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            description: String::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the agent does, shown to models that may delegate to it.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The kind of behavior the agent runs.
    pub fn kind(&self) -> &'static str {
        self.behavior.kind()
    }

    /// The parent, if attached and still alive.
    pub fn parent(&self) -> Option<Arc<Agent>> {
        self.parent.get().and_then(|parent| parent.agent.upgrade())
    }

    /// Whether the agent has been attached to a parent.
    pub fn is_attached(&self) -> bool {
        self.parent.get().is_some()
    }

    /// The direct children, in attach order.
    pub fn children(&self) -> Vec<Arc<Agent>> {
        self.children.read().clone()
    }

    /// Attach `child` as the last child of this agent.
    ///
    /// Fails without touching either agent when the child already has a
    /// parent, when a sibling already carries its name, or when the child
    /// is this agent or one of its ancestors.
    pub fn attach(self: &Arc<Self>, child: Arc<Agent>) -> Result<()> {
        if let Some(parent) = child.parent.get() {
            return Err(Error::AlreadyParented {
                agent: child.name.clone(),
                parent: parent.name.clone(),
            }
            .into());
        }

        let mut ancestor = Some(self.clone());
        while let Some(node) = ancestor {
            if Arc::ptr_eq(&node, &child) {
                return Err(Error::Cycle {
                    agent: child.name.clone(),
                    parent: self.name.clone(),
                }
                .into());
            }
            ancestor = node.parent();
        }

        let mut children = self.children.write();
        if children.iter().any(|sibling| sibling.name == child.name) {
            return Err(Error::DuplicateSiblingName {
                parent: self.name.clone(),
                agent: child.name.clone(),
            }
            .into());
        }

        let parent = Parent {
            name: self.name.clone(),
            agent: Arc::downgrade(self),
        };
        if let Err(lost) = child.parent.set(parent) {
            // Another parent won a concurrent attach.
            let winner = child.parent.get().map_or(lost.name, |p| p.name.clone());
            return Err(Error::AlreadyParented {
                agent: child.name.clone(),
                parent: winner,
            }
            .into());
        }

        tracing::debug!("attached '{}' under '{}'", child.name, self.name);
        children.push(child);
        Ok(())
    }

    /// Find a direct child by name.
    pub fn find_child(&self, name: &str) -> Option<Arc<Agent>> {
        self.children
            .read()
            .iter()
            .find(|child| child.name == name)
            .cloned()
    }

    /// Find an agent by name anywhere in the tree this agent belongs to.
    ///
    /// The search starts at the root and visits nodes depth-first, parents
    /// before children and children left to right.
    pub fn find_in_tree(self: &Arc<Self>, name: &str) -> Option<Arc<Agent>> {
        self.root().find_in_subtree(name)
    }

    /// Depth-first search of this agent and its descendants.
    pub fn find_in_subtree(self: &Arc<Self>, name: &str) -> Option<Arc<Agent>> {
        if self.name == name {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find_in_subtree(name))
    }

    /// The top of the tree.
    pub fn root(self: &Arc<Self>) -> Arc<Agent> {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// Run to completion and return the terminal output.
    pub async fn run(self: &Arc<Self>, ctx: InvocationContext) -> Result<Output> {
        tracing::debug!("running {} agent '{}'", self.kind(), self.name);
        let span = tracing::debug_span!("agent", name = %self.name, invocation = %ctx.invocation_id);
        let output = self.behavior.run(self, ctx).instrument(span).await?;
        tracing::debug!(
            "agent '{}' finished with {} new messages",
            self.name,
            output.produced.len()
        );
        Ok(output)
    }

    /// Stream the events of one run on the caller's task.
    pub fn stream(self: &Arc<Self>, ctx: InvocationContext) -> Events<'_> {
        self.behavior.stream(self, ctx)
    }

    /// Stream the events of one run on a task of its own.
    ///
    /// Nothing runs until the first poll; dropping the stream cancels the
    /// run.
    pub fn run_streaming(self: &Arc<Self>, ctx: InvocationContext) -> TaskStream<Event> {
        let agent = self.clone();
        TaskStream::new(try_stream! {
            tracing::debug!(
                "streaming {} agent '{}' (invocation {})",
                agent.kind(),
                agent.name,
                ctx.invocation_id
            );
            let mut events = agent.stream(ctx);
            while let Some(event) = events.next().await {
                yield event?;
            }
        })
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("parent", &self.parent.get().map(|p| &p.name))
            .field("children", &self.children.read().len())
            .finish()
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    description: String,
    children: Vec<Arc<Agent>>,
}

impl AgentBuilder {
    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a child.
    pub fn child(mut self, child: Arc<Agent>) -> Self {
        self.children.push(child);
        self
    }

    /// Add several children, in order.
    pub fn children(mut self, children: impl IntoIterator<Item = Arc<Agent>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Validate and create the agent, attaching its children.
    ///
    /// Every check runs before any child is attached, so a failed build
    /// leaves the children parentless.
    pub fn build(self, behavior: impl Behavior + 'static) -> Result<Arc<Agent>> {
        validate_name(&self.name)?;

        let mut seen = HashSet::new();
        for child in &self.children {
            if let Some(parent) = child.parent.get() {
                return Err(Error::AlreadyParented {
                    agent: child.name.clone(),
                    parent: parent.name.clone(),
                }
                .into());
            }
            if !seen.insert(child.name.as_str()) {
                return Err(Error::DuplicateSiblingName {
                    parent: self.name.clone(),
                    agent: child.name.clone(),
                }
                .into());
            }
        }

        let agent = Arc::new(Agent {
            name: self.name,
            description: self.description,
            behavior: Box::new(behavior),
            parent: OnceLock::new(),
            children: RwLock::new(Vec::with_capacity(self.children.len())),
        });
        for child in self.children {
            agent.attach(child)?;
        }
        Ok(agent)
    }
}

/// Check that `name` is an identifier and not reserved.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name == USER {
        return Err(Error::ReservedName(name.to_owned()));
    }

    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidName(name.to_owned()));
    }
    Ok(())
}
