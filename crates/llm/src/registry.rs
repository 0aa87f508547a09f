//! Model registry.
//!
//! Maps model identifiers to adapter factories by regular expression.
//! Patterns are tried in registration order and the first match wins.
//! Matching is unanchored: `gpt-4-.*` matches anywhere in the identifier,
//! so anchor with `^`/`$` when that matters.

use crate::Llm;
use acore::Error;
use anyhow::Result;
use parking_lot::RwLock;
use regex::Regex;
use std::{fmt, sync::Arc};

/// Builds an adapter for a model identifier.
pub type Factory = Arc<dyn Fn(&str) -> Result<Arc<dyn Llm>> + Send + Sync>;

struct Entry {
    pattern: Regex,
    factory: Factory,
}

/// Ordered pattern → factory table.
///
/// Registration takes the write lock for one append; lookups share the
/// read lock. An engine usually builds one registry at startup and shares
/// it behind an `Arc`.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pattern. Earlier registrations keep precedence.
    pub fn register<F>(&self, pattern: &str, factory: F) -> Result<()>
    where
        F: Fn(&str) -> Result<Arc<dyn Llm>> + Send + Sync + 'static,
    {
        self.insert(pattern, Arc::new(factory))
    }

    /// Append several patterns sharing one factory, in order.
    pub fn register_all<F>(&self, patterns: &[&str], factory: F) -> Result<()>
    where
        F: Fn(&str) -> Result<Arc<dyn Llm>> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(factory);
        for pattern in patterns {
            self.insert(pattern, factory.clone())?;
        }
        Ok(())
    }

    fn insert(&self, pattern: &str, factory: Factory) -> Result<()> {
        let compiled = Regex::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        self.entries.write().push(Entry {
            pattern: compiled,
            factory,
        });
        tracing::debug!("registered model pattern {pattern}");
        Ok(())
    }

    /// The factory of the first pattern matching `model`.
    pub fn resolve(&self, model: &str) -> Option<Factory> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.pattern.is_match(model))
            .map(|entry| entry.factory.clone())
    }

    /// Resolve and build an adapter for `model`.
    ///
    /// Fails with [`Error::UnresolvedModel`] when nothing matches.
    pub fn instantiate(&self, model: &str) -> Result<Arc<dyn Llm>> {
        let Some(factory) = self.resolve(model) else {
            return Err(Error::UnresolvedModel(model.to_owned()).into());
        };
        factory(model)
    }

    /// Registered patterns, in precedence order.
    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.pattern.as_str().to_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Log every registered pattern at info level.
    pub fn log_registered(&self) {
        let patterns = self.patterns();
        tracing::info!("{} model patterns registered", patterns.len());
        for pattern in patterns {
            tracing::info!("  {pattern}");
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("patterns", &self.patterns())
            .finish()
    }
}
