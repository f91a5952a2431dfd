//! The stage trait and the small built-in stages.
//!
//! Stages are the fundamental execution unit. Each one takes a
//! [`StageValue`], does some work, and returns a new [`StageValue`].
//! Templates, invokers, parsers, and chains all implement [`Stage`].

use crate::chain::Chain;
use crate::error::{ChainError, Result};
use crate::value::StageValue;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, pinned, Send future, the return type of [`Stage::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for pipeline stages.
///
/// The trait is object-safe so stages can be stored as `Arc<dyn Stage>`
/// and composed in chains without generic constraints.
pub trait Stage: Send + Sync {
    /// Stable identifier for the stage type (e.g. `"prompt-template"`, `"chain"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging and errors).
    fn name(&self) -> &str;

    /// Execute the stage.
    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>>;
}

impl Stage for Arc<dyn Stage> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        (**self).invoke(input)
    }
}

/// Pipe syntax for every stage.
///
/// ```
/// use prompt_pipe::{PromptTemplate, StageExt, StrOutputParser};
///
/// let chain = PromptTemplate::from_template("Tell me a joke about {topic}")
///     .unwrap()
///     .pipe(StrOutputParser::new());
/// assert_eq!(chain.len(), 2);
/// ```
pub trait StageExt: Stage + Sized + 'static {
    /// Start a chain that runs `self`, then `next`.
    fn pipe<S: Stage + 'static>(self, next: S) -> Chain {
        Chain::from_stage(self).pipe(next)
    }
}

impl<T: Stage + Sized + 'static> StageExt for T {}

/// Fan-out/fan-in stage.
///
/// Every branch receives the same input; the outputs are collected into a
/// [`StageValue::Map`] keyed by branch name. Branches run one after another
/// in insertion order, and the first failure aborts the whole map.
#[derive(Clone)]
pub struct StageMap {
    name: String,
    branches: Vec<(String, Arc<dyn Stage>)>,
}

impl StageMap {
    pub fn new() -> Self {
        Self {
            name: "map".to_string(),
            branches: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add (or replace) a branch.
    pub fn with(mut self, key: impl Into<String>, stage: impl Stage + 'static) -> Self {
        let key = key.into();
        let stage: Arc<dyn Stage> = Arc::new(stage);
        match self.branches.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = stage,
            None => self.branches.push((key, stage)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|(k, _)| k.as_str())
    }

    async fn run(&self, input: StageValue) -> Result<StageValue> {
        let mut results = BTreeMap::new();
        for (key, branch) in &self.branches {
            tracing::debug!(map = %self.name, branch = %key, stage = branch.name(), "running branch");
            let value = branch.invoke(input.clone()).await?;
            results.insert(key.clone(), value);
        }
        Ok(StageValue::Map(results))
    }
}

impl Default for StageMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for StageMap {
    fn kind(&self) -> &'static str {
        "map"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(self.run(input))
    }
}

/// Select one key from a map input.
///
/// Used inside a [`StageMap`] to forward part of the initial input next to
/// sub-chain results.
#[derive(Debug, Clone)]
pub struct Pick {
    key: String,
}

impl Pick {
    pub fn key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Stage for Pick {
    fn kind(&self) -> &'static str {
        "pick"
    }

    fn name(&self) -> &str {
        &self.key
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(async move {
            match input {
                StageValue::Map(mut map) => map
                    .remove(&self.key)
                    .ok_or_else(|| ChainError::MissingPlaceholder(self.key.clone())),
                other => Err(ChainError::InvalidInput {
                    stage: self.key.clone(),
                    expected: "map",
                    found: other.kind(),
                }),
            }
        })
    }
}

/// A stage backed by a synchronous closure.
///
/// # Example
///
/// ```
/// use prompt_pipe::{Lambda, StageValue};
///
/// let upper = Lambda::new("upper", |v: StageValue| Ok(v.to_string().to_uppercase().into()));
/// ```
pub struct Lambda<F> {
    name: String,
    f: F,
}

impl<F> Lambda<F>
where
    F: Fn(StageValue) -> Result<StageValue> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Stage for Lambda<F>
where
    F: Fn(StageValue) -> Result<StageValue> + Send + Sync,
{
    fn kind(&self) -> &'static str {
        "lambda"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        let result = (self.f)(input);
        Box::pin(std::future::ready(result))
    }
}
