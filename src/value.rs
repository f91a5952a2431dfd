//! The value threaded through a chain.
//!
//! Each stage consumes one [`StageValue`] and produces another. Templates
//! read a [`StageValue::Map`], invokers read a [`StageValue::Prompt`], and
//! parsers read a [`StageValue::Response`].

use crate::message::PromptValue;
use crate::model::ModelResponse;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Wire type between stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageValue {
    /// Plain text (parser output, user input).
    Text(String),
    /// Named values (chain input, fan-out results).
    Map(BTreeMap<String, StageValue>),
    /// A rendered prompt.
    Prompt(PromptValue),
    /// A model response.
    Response(ModelResponse),
}

impl StageValue {
    /// Build a [`StageValue::Map`] from key/value pairs.
    ///
    /// ```
    /// use prompt_pipe::StageValue;
    ///
    /// let input = StageValue::map([("topic", "cats")]);
    /// assert_eq!(input.get("topic").and_then(|v| v.as_text()), Some("cats"));
    /// ```
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StageValue>,
    {
        StageValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StageValue::Text(_) => "text",
            StageValue::Map(_) => "map",
            StageValue::Prompt(_) => "prompt",
            StageValue::Response(_) => "response",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StageValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            StageValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StageValue>> {
        match self {
            StageValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ModelResponse> {
        match self {
            StageValue::Response(r) => Some(r),
            _ => None,
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&StageValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Text used when this value fills a template placeholder.
    pub fn to_prompt_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageValue::Text(s) => f.write_str(s),
            StageValue::Prompt(p) => write!(f, "{}", p),
            StageValue::Response(r) => f.write_str(&r.content),
            StageValue::Map(m) => {
                for (i, (key, value)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for StageValue {
    fn from(s: String) -> Self {
        StageValue::Text(s)
    }
}

impl From<&str> for StageValue {
    fn from(s: &str) -> Self {
        StageValue::Text(s.to_string())
    }
}

impl From<PromptValue> for StageValue {
    fn from(p: PromptValue) -> Self {
        StageValue::Prompt(p)
    }
}

impl From<ModelResponse> for StageValue {
    fn from(r: ModelResponse) -> Self {
        StageValue::Response(r)
    }
}

impl From<BTreeMap<String, StageValue>> for StageValue {
    fn from(m: BTreeMap<String, StageValue>) -> Self {
        StageValue::Map(m)
    }
}
