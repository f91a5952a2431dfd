//! Chat model for OpenAI-compatible APIs.
//!
//! [`OpenAiChatModel`] talks to any `/chat/completions` endpoint: OpenAI,
//! Gemini's OpenAI-compatible surface, Groq, Together AI, vLLM, llama.cpp
//! server, LM Studio, and Ollama's `/v1/`.
//!
//! Streaming: SSE with `data: {"choices": [{"delta": {"content": "token"}}]}`.

use super::sse::{delta_content, SseDecoder, SseEvent};
use super::{ChatModel, ModelConfig, ModelResponse};
use crate::error::{ChainError, InvocationError, Result};
use crate::message::Message;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

/// Default base URL (OpenAI).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat model for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use prompt_pipe::model::OpenAiChatModel;
///
/// let model = OpenAiChatModel::new("gpt-4o-mini").with_api_key("sk-...");
/// assert_eq!(model.endpoint(), "https://api.openai.com/v1/chat/completions");
/// ```
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    model: String,
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    api_key: Option<String>,
    /// Optional organization ID. If set, sent as `OpenAI-Organization: {org}`.
    organization: Option<String>,
    config: ModelConfig,
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.chars().count() > 6 {
                        format!("{}***", k.chars().take(6).collect::<String>())
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("organization", &self.organization)
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiChatModel {
    /// Create a model client for `model` against [`DEFAULT_BASE_URL`], without authentication.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: None,
            organization: None,
            config: ModelConfig::default(),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set the base URL, including any version path (e.g. `.../v1`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full URL of the chat completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for `/chat/completions`.
    fn build_body(&self, messages: &[Message], stream: bool) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url).json(body);

        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }

    /// Send the request and turn non-success statuses into errors.
    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.endpoint();
        tracing::debug!(url = %url, model = %self.model, "sending chat completion request");

        let resp = self.build_http_request(&url, body).send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "chat completion request failed");
            InvocationError::Transport(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), "provider returned error status");
            return Err(InvocationError::Http {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        Ok(resp)
    }

    /// Validate a completion body and build the response.
    ///
    /// An `error` object becomes [`InvocationError::Provider`]; a body
    /// without `choices[0].message.content` is a
    /// [`ChainError::MalformedResponse`].
    pub fn parse_completion(json_resp: &Value) -> Result<ModelResponse> {
        Self::check_provider_error(json_resp)?;

        let content = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                let snippet: String = json_resp.to_string().chars().take(200).collect();
                ChainError::MalformedResponse(format!(
                    "missing choices[0].message.content in {}",
                    snippet
                ))
            })?;

        Ok(ModelResponse {
            content: content.to_string(),
            model: json_resp
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: Self::extract_metadata(json_resp),
        })
    }

    /// Turn a provider `error` object (in a body or a streamed event) into
    /// [`InvocationError::Provider`].
    fn check_provider_error(json_resp: &Value) -> Result<()> {
        match json_resp.get("error") {
            Some(err) => {
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                tracing::warn!(error = %message, "provider reported an error");
                Err(InvocationError::Provider(message).into())
            }
            None => Ok(()),
        }
    }

    /// Extract usage and id from a completion body.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[Message]) -> Result<ModelResponse> {
        let body = self.build_body(messages, false);
        let resp = self.send(&body).await?;
        let json_resp: Value = resp.json().await?;
        Self::parse_completion(&json_resp)
    }

    async fn stream(
        &self,
        messages: &[Message],
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<ModelResponse> {
        let body = self.build_body(messages, true);
        let resp = self.send(&body).await?;

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();
        let mut saw_content = false;
        let mut done = false;

        while !done {
            let events = match stream.next().await {
                Some(chunk) => decoder.push(&chunk?),
                None => {
                    done = true;
                    decoder.finish()
                }
            };
            for event in events {
                match event {
                    SseEvent::Done => {
                        done = true;
                        break;
                    }
                    SseEvent::Data(chunk) => {
                        Self::check_provider_error(&chunk)?;
                        if let Some(content) = delta_content(&chunk) {
                            saw_content = true;
                            if !content.is_empty() {
                                accumulated.push_str(content);
                                on_token(content.to_string());
                            }
                        }
                    }
                }
            }
        }

        if !saw_content {
            return Err(ChainError::MalformedResponse(
                "stream ended without any choices[0].delta.content".to_string(),
            ));
        }

        Ok(ModelResponse::new(accumulated).with_model(self.model.clone()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its base URL.
    ///
    /// The whole request is read first so the client never sees a reset.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    fn sse_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{}",
            body
        )
    }

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    fn translate_messages() -> Vec<Message> {
        vec![
            Message::system("Translate the following from English into Italian"),
            Message::user("What time is it?"),
        ]
    }

    #[test]
    fn test_chat_body() {
        let model = OpenAiChatModel::new("gpt-4o-mini")
            .with_config(ModelConfig::default().with_temperature(1.0));
        let body = model.build_body(&translate_messages(), false);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["stream"], false);
        assert!(body.get("max_tokens").is_none());

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "What time is it?");
    }

    #[test]
    fn test_streaming_body_with_max_tokens() {
        let model = OpenAiChatModel::new("gpt-4o-mini")
            .with_config(ModelConfig::default().with_max_tokens(128));
        let body = model.build_body(&translate_messages(), true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let model = OpenAiChatModel::new("gemini-2.0-flash")
            .with_base_url("https://generativelanguage.googleapis.com/v1beta/openai/");
        assert_eq!(
            model.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_auth_headers() {
        let model = OpenAiChatModel::new("gpt-4o")
            .with_api_key("sk-test123")
            .with_organization("org-abc");

        let req = model
            .build_http_request(&model.endpoint(), &json!({"test": true}))
            .build()
            .expect("build request");

        assert_eq!(req.headers().get("Authorization").expect("auth header"), "Bearer sk-test123");
        assert_eq!(req.headers().get("OpenAI-Organization").expect("org header"), "org-abc");
    }

    #[test]
    fn test_no_auth_headers() {
        let model = OpenAiChatModel::new("gpt-4o");
        let req = model
            .build_http_request(&model.endpoint(), &json!({}))
            .build()
            .expect("build request");
        assert!(req.headers().get("Authorization").is_none());
        assert!(req.headers().get("OpenAI-Organization").is_none());
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Che ore sono?"}}],
            "usage": {"total_tokens": 12}
        });
        let resp = OpenAiChatModel::parse_completion(&body).unwrap();
        assert_eq!(resp.content, "Che ore sono?");
        assert_eq!(resp.model.as_deref(), Some("gpt-4o-mini"));
        let meta = resp.metadata.expect("metadata");
        assert_eq!(meta["usage"]["total_tokens"], 12);
        assert_eq!(meta["id"], "chatcmpl-1");
    }

    #[test]
    fn test_parse_completion_missing_content() {
        let body = json!({"choices": [{"message": {"role": "assistant"}}]});
        let err = OpenAiChatModel::parse_completion(&body).unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));

        let err = OpenAiChatModel::parse_completion(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_completion_provider_error() {
        let body = json!({"error": {"message": "API key not valid", "code": 400}});
        let err = OpenAiChatModel::parse_completion(&body).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Invocation(InvocationError::Provider(ref m)) if m == "API key not valid"
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let model = OpenAiChatModel::new("gpt-4o").with_api_key("sk-1234567890abcdef");
        let debug_output = format!("{:?}", model);
        assert!(!debug_output.contains("1234567890abcdef"), "API key must not appear in Debug output");
        assert!(debug_output.contains("sk-123"));
        assert!(debug_output.contains("***"));
    }

    #[test]
    fn test_has_api_key() {
        assert!(!OpenAiChatModel::new("m").has_api_key());
        assert!(OpenAiChatModel::new("m").with_api_key("k").has_api_key());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_invocation_error() {
        let model = OpenAiChatModel::new("m").with_base_url("http://127.0.0.1:1");
        let err = model.generate(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ChainError::Invocation(InvocationError::Transport(_))));
    }

    #[tokio::test]
    async fn test_generate_over_http() {
        let body = json!({
            "model": "gemini-2.0-flash",
            "choices": [{"message": {"role": "assistant", "content": "مرحبا!"}}]
        })
        .to_string();
        let base = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let model = OpenAiChatModel::new("gemini-2.0-flash").with_base_url(base);
        let resp = model.generate(&translate_messages()).await.unwrap();
        assert_eq!(resp.content, "مرحبا!");
        assert_eq!(resp.model.as_deref(), Some("gemini-2.0-flash"));
    }

    #[tokio::test]
    async fn test_error_status_keeps_code_and_body() {
        let body = r#"{"error":{"message":"rate limited"}}"#;
        let base = serve_once(format!(
            "HTTP/1.1 429 Too Many Requests\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let model = OpenAiChatModel::new("m").with_base_url(base).with_api_key("k");
        let err = model.generate(&[Message::user("hi")]).await.unwrap_err();
        match err {
            ChainError::Invocation(InvocationError::Http { status, body: text }) => {
                assert_eq!(status, 429);
                assert_eq!(text, body);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_accumulates_tokens_until_done() {
        let body = format!(
            "data: {}\n\n{}{}{}data: [DONE]\n\n{}",
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            delta("Hel"),
            delta("lo"),
            delta(" world"),
            delta("after done"),
        );
        let base = serve_once(sse_response(&body)).await;

        let model = OpenAiChatModel::new("m").with_base_url(base);
        let mut tokens = Vec::new();
        let resp = model
            .stream(&[Message::user("hi")], &mut |t| tokens.push(t))
            .await
            .unwrap();
        assert_eq!(tokens, vec!["Hel", "lo", " world"]);
        assert_eq!(resp.content, "Hello world");
        assert_eq!(resp.model.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn test_stream_error_event_is_provider_error() {
        let body = format!(
            "data: {}\n\n",
            json!({"error": {"message": "quota exceeded"}})
        );
        let base = serve_once(sse_response(&body)).await;

        let model = OpenAiChatModel::new("m").with_base_url(base);
        let err = model
            .stream(&[Message::user("hi")], &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Invocation(InvocationError::Provider(ref m)) if m == "quota exceeded"
        ));
    }

    #[tokio::test]
    async fn test_stream_without_content_is_malformed() {
        let base = serve_once(sse_response("data: [DONE]\n\n")).await;

        let model = OpenAiChatModel::new("m").with_base_url(base);
        let err = model
            .stream(&[Message::user("hi")], &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
    }
}
