//! Chat-model trait, normalized response type, and the invoker stage.
//!
//! The [`ChatModel`] trait abstracts over providers. It takes an ordered
//! message list and returns a [`ModelResponse`]. [`Invoker`] wraps a model
//! as a [`Stage`] so it can sit between a template and a parser.
//!
//! ```text
//! PromptTemplate ──► Invoker ──► ChatModel::generate() ──► ModelResponse ──► StrOutputParser
//!                                        │
//!                          ┌─────────────┼──────────────┐
//!                   OpenAiChatModel  MockChatModel  FnChatModel
//!                  /chat/completions  canned text    closure
//! ```

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{FnChatModel, MockChatModel};
pub use openai::OpenAiChatModel;

use crate::error::{ChainError, Result};
use crate::message::{Message, PromptValue};
use crate::stage::{BoxFut, Stage};
use crate::value::StageValue;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Sampling configuration sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate. Provider default when `None`.
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// A normalized model response.
///
/// `content` is always present: providers validate it while building the
/// response, so parsers never probe for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResponse {
    /// The generated text content.
    pub content: String,

    /// Model that produced this response, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider-specific metadata (token usage, response id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            metadata: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Abstraction over chat-completion providers.
///
/// Implementors send the ordered message list to the provider and return the
/// generated text. This is the only place network I/O happens; failures are
/// reported as [`ChainError::Invocation`] and never retried here.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Execute a non-streaming completion.
    async fn generate(&self, messages: &[Message]) -> Result<ModelResponse>;

    /// Execute a streaming completion.
    ///
    /// `on_token` is called for each chunk as it arrives. The accumulated
    /// text is returned as a [`ModelResponse`]. Models without a streaming
    /// transport emit the whole response as a single chunk.
    async fn stream(
        &self,
        messages: &[Message],
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<ModelResponse> {
        let response = self.generate(messages).await?;
        on_token(response.content.clone());
        Ok(response)
    }

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Stage that sends a rendered prompt to a [`ChatModel`].
///
/// Accepts `Prompt` values (text or messages) and plain `Text`, which
/// becomes a single user message. Produces a `Response`.
#[derive(Clone)]
pub struct Invoker {
    name: String,
    model: Arc<dyn ChatModel>,
}

impl Invoker {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            name: model.name().to_string(),
            model,
        }
    }

    pub fn from_model(model: impl ChatModel + 'static) -> Self {
        Self::new(Arc::new(model))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The wrapped model.
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Invoke the model directly, outside a chain.
    pub async fn call(&self, prompt: impl Into<PromptValue>) -> Result<ModelResponse> {
        let messages = prompt.into().into_messages();
        self.generate(&messages).await
    }

    fn messages_from(&self, input: StageValue) -> Result<Vec<Message>> {
        match input {
            StageValue::Prompt(prompt) => Ok(prompt.into_messages()),
            StageValue::Text(text) => Ok(vec![Message::user(text)]),
            other => Err(ChainError::InvalidInput {
                stage: self.name.clone(),
                expected: "prompt",
                found: other.kind(),
            }),
        }
    }

    async fn generate(&self, messages: &[Message]) -> Result<ModelResponse> {
        tracing::debug!(
            invoker = %self.name,
            model = self.model.name(),
            messages = messages.len(),
            "invoking model"
        );
        let response = self.model.generate(messages).await?;
        tracing::debug!(invoker = %self.name, chars = response.content.len(), "model responded");
        Ok(response)
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .finish()
    }
}

impl Stage for Invoker {
    fn kind(&self) -> &'static str {
        "invoker"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(async move {
            let messages = self.messages_from(input)?;
            self.generate(&messages).await.map(StageValue::Response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[tokio::test]
    async fn test_invoker_text_prompt_becomes_user_message() {
        let mock = Arc::new(MockChatModel::fixed("ok"));
        let invoker = Invoker::new(mock.clone());

        let out = invoker
            .invoke(StageValue::Prompt(PromptValue::from("Tell me a joke about cats")))
            .await
            .unwrap();
        assert_eq!(out, StageValue::Response(ModelResponse::new("ok").with_model("mock")));
        assert_eq!(mock.requests()[0], vec![Message::user("Tell me a joke about cats")]);
    }

    #[tokio::test]
    async fn test_invoker_keeps_message_roles() {
        let mock = Arc::new(MockChatModel::fixed("Ciao"));
        let invoker = Invoker::new(mock.clone());
        let prompt = PromptValue::Messages(vec![
            Message::system("Translate the following from English into Italian"),
            Message::user("What time is it?"),
        ]);

        invoker.call(prompt).await.unwrap();
        let sent = &mock.requests()[0];
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "What time is it?");
    }

    #[tokio::test]
    async fn test_invoker_rejects_map_input() {
        let invoker = Invoker::from_model(MockChatModel::fixed("x"));
        let err = invoker.invoke(StageValue::map([("a", "b")])).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidInput { expected: "prompt", found: "map", .. }
        ));
    }

    #[tokio::test]
    async fn test_default_stream_emits_single_chunk() {
        let model = FnChatModel::new(|_: &[Message]| Ok("whole answer".to_string()));
        let mut chunks = Vec::new();
        let response = model
            .stream(&[Message::user("hi")], &mut |t| chunks.push(t))
            .await
            .unwrap();
        assert_eq!(response.content, "whole answer");
        assert_eq!(chunks, vec!["whole answer"]);
    }

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert!(config.max_tokens.is_none());
        let config = config.with_temperature(1.0).with_max_tokens(256);
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.max_tokens, Some(256));
    }
}
