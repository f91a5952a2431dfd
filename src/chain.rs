//! Sequential chain of stages.
//!
//! [`Chain`] composes stages into a pipeline, passing each stage's output
//! as the next stage's input. For fan-out, embed a
//! [`StageMap`](crate::stage::StageMap) as one of the stages.

use crate::{
    error::Result,
    stage::{BoxFut, Stage},
    value::StageValue,
    ChainError,
};
use std::sync::Arc;

/// A sequential chain of stages.
///
/// Executes stages in order, piping each output into the next stage.
/// Chains are immutable once built: [`pipe`](Chain::pipe) consumes the
/// chain and returns a new one. Stages are shared, so cloning a chain is
/// cheap and the same chain can be embedded in several others.
///
/// `Chain` itself implements [`Stage`], so chains can be nested.
///
/// # Example
///
/// ```ignore
/// use prompt_pipe::{Chain, Invoker, PromptTemplate, StrOutputParser, StageValue};
///
/// let chain = Chain::new("joke")
///     .pipe(PromptTemplate::from_template("Tell me a joke about {topic}")?)
///     .pipe(Invoker::new(model))
///     .pipe(StrOutputParser::new());
///
/// let output = chain.invoke(StageValue::map([("topic", "cats")])).await?;
/// println!("{}", output);
/// ```
#[derive(Clone)]
pub struct Chain {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Chain {
    /// Create a new empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Create a chain whose first stage is `stage`.
    pub fn from_stage(stage: impl Stage + 'static) -> Self {
        let name = stage.name().to_string();
        Self::new(name).pipe(stage)
    }

    /// Rename the chain.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a stage, returning the extended chain.
    pub fn pipe(self, stage: impl Stage + 'static) -> Self {
        self.pipe_shared(Arc::new(stage))
    }

    /// Append an already shared stage.
    pub fn pipe_shared(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, returning every intermediate output.
    ///
    /// The first stage receives `input`. Each subsequent stage receives the
    /// previous output. The first failing stage aborts the run and its
    /// error is returned as is.
    pub async fn invoke_all(&self, input: StageValue) -> Result<Vec<StageValue>> {
        if self.stages.is_empty() {
            return Err(ChainError::InvalidConfig(format!(
                "Chain '{}' has no stages",
                self.name
            )));
        }

        let mut outputs: Vec<StageValue> = Vec::with_capacity(self.stages.len());
        let mut current = input;

        for (index, stage) in self.stages.iter().enumerate() {
            tracing::debug!(
                chain = %self.name,
                index,
                stage = stage.name(),
                kind = stage.kind(),
                input = current.kind(),
                "invoking stage"
            );
            let output = stage.invoke(current).await.inspect_err(|e| {
                tracing::debug!(chain = %self.name, stage = stage.name(), error = %e, "stage failed");
            })?;
            current = output.clone();
            outputs.push(output);
        }

        Ok(outputs)
    }

    /// Run every stage and return only the final output.
    pub async fn invoke(&self, input: StageValue) -> Result<StageValue> {
        let outputs = self.invoke_all(input).await?;
        outputs
            .into_iter()
            .last()
            .ok_or_else(|| ChainError::InvalidConfig(format!("Chain '{}' produced no outputs", self.name)))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Stage for Chain {
    fn kind(&self) -> &'static str {
        "chain"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(Chain::invoke(self, input))
    }
}

/// Compose two stages: run `first`, feed its output to `second`.
///
/// Composition is associative in execution order:
/// `compose(compose(a, b), c)` and `compose(a, compose(b, c))` both run
/// `a`, then `b`, then `c`.
pub fn compose(first: impl Stage + 'static, second: impl Stage + 'static) -> Chain {
    Chain::from_stage(first).pipe(second)
}
