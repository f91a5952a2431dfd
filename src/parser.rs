//! Output parsers: turn a model response into a plain value.

use crate::error::{ChainError, Result};
use crate::model::ModelResponse;
use crate::stage::{BoxFut, Stage};
use crate::value::StageValue;

/// Extracts the text content of a model response.
///
/// As a stage it maps `Response` to `Text` and lets `Text` through
/// unchanged. Anything else has no content to extract and fails with
/// [`ChainError::MalformedResponse`].
///
/// # Examples
///
/// ```
/// use prompt_pipe::{ModelResponse, StrOutputParser};
///
/// let parser = StrOutputParser::new();
/// assert_eq!(parser.parse(&ModelResponse::new("Paris.")), "Paris.");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StrOutputParser {
    trim: bool,
}

impl StrOutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip leading and trailing whitespace from the content.
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn parse(&self, response: &ModelResponse) -> String {
        self.finish(&response.content)
    }

    /// Parse any stage value carrying text.
    pub fn parse_value(&self, value: StageValue) -> Result<String> {
        match value {
            StageValue::Response(response) => Ok(self.parse(&response)),
            StageValue::Text(text) => Ok(self.finish(&text)),
            other => Err(ChainError::MalformedResponse(format!(
                "expected a model response with text content, got {}",
                other.kind()
            ))),
        }
    }

    fn finish(&self, text: &str) -> String {
        if self.trim {
            text.trim().to_string()
        } else {
            text.to_string()
        }
    }
}

impl Stage for StrOutputParser {
    fn kind(&self) -> &'static str {
        "str-output-parser"
    }

    fn name(&self) -> &str {
        "str-output-parser"
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(async move { self.parse_value(input).map(StageValue::Text) })
    }
}
