//! Deterministic models for tests and offline demos.
//!
//! [`MockChatModel`] returns pre-configured responses in order and records
//! every message list it receives. [`FnChatModel`] computes the response
//! from the messages with a closure.
//!
//! # Example
//!
//! ```
//! use prompt_pipe::model::MockChatModel;
//!
//! let mock = MockChatModel::new(vec!["Hello, world!".to_string()]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatModel, ModelResponse};
use crate::error::Result;
use crate::message::Message;

/// A test model that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
#[derive(Debug)]
pub struct MockChatModel {
    responses: Vec<String>,
    index: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockChatModel {
    /// Create a mock model with the given canned responses.
    ///
    /// Responses are returned in order. When exhausted, cycles from the beginning.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockChatModel requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Every message list received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_response(&self, messages: &[Message]) -> String {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, messages: &[Message]) -> Result<ModelResponse> {
        let text = self.next_response(messages);
        Ok(ModelResponse::new(text).with_model("mock"))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A model backed by a closure over the message list.
///
/// # Example
///
/// ```
/// use prompt_pipe::model::FnChatModel;
/// use prompt_pipe::Message;
///
/// let echo = FnChatModel::new(|messages: &[Message]| {
///     Ok(format!("ECHO: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
/// });
/// ```
pub struct FnChatModel<F> {
    f: F,
}

impl<F> FnChatModel<F>
where
    F: Fn(&[Message]) -> Result<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ChatModel for FnChatModel<F>
where
    F: Fn(&[Message]) -> Result<String> + Send + Sync,
{
    async fn generate(&self, messages: &[Message]) -> Result<ModelResponse> {
        (self.f)(messages).map(ModelResponse::new)
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockChatModel::fixed("Hello!");
        let resp = mock.generate(&[Message::user("test")]).await.unwrap();
        assert_eq!(resp.content, "Hello!");
        assert_eq!(resp.model.as_deref(), Some("mock"));
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockChatModel::new(vec!["first".into(), "second".into()]);
        let messages = [Message::user("test")];
        let r1 = mock.generate(&messages).await.unwrap();
        let r2 = mock.generate(&messages).await.unwrap();
        let r3 = mock.generate(&messages).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        assert_eq!(r3.content, "first"); // cycles
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockChatModel::fixed("ok");
        mock.generate(&[Message::system("a"), Message::user("b")]).await.unwrap();
        mock.generate(&[Message::user("c")]).await.unwrap();
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0][1].content, "b");
        assert_eq!(requests[1][0].content, "c");
    }

    #[tokio::test]
    async fn test_mock_streaming() {
        let mock = MockChatModel::fixed("streamed");
        let mut tokens = Vec::new();
        let resp = mock
            .stream(&[Message::user("test")], &mut |t| tokens.push(t))
            .await
            .unwrap();
        assert_eq!(resp.content, "streamed");
        assert_eq!(tokens, vec!["streamed"]);
    }

    #[tokio::test]
    async fn test_fn_model_echo() {
        let echo = FnChatModel::new(|messages: &[Message]| {
            Ok(format!("ECHO: {}", messages[0].content))
        });
        let resp = echo.generate(&[Message::user("cats")]).await.unwrap();
        assert_eq!(resp.content, "ECHO: cats");
    }
}
