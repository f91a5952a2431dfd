//! Role-tagged chat messages and rendered prompts.

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    #[serde(alias = "human")]
    User,
}

impl Role {
    /// Wire name used by OpenAI-compatible providers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" | "human" => Ok(Role::User),
            other => Err(ChainError::InvalidConfig(format!(
                "unknown message role '{}'",
                other
            ))),
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.role {
            Role::System => "System",
            Role::User => "Human",
        };
        write!(f, "{}: {}", label, self.content)
    }
}

/// A rendered prompt, ready for a model.
///
/// Plain templates produce [`PromptValue::Text`]; chat templates produce
/// [`PromptValue::Messages`]. Models always receive a message list, so text
/// prompts become a single user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PromptValue {
    Text(String),
    Messages(Vec<Message>),
}

impl PromptValue {
    /// Convert into the ordered message list sent to a model.
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            PromptValue::Text(text) => vec![Message::user(text.clone())],
            PromptValue::Messages(messages) => messages.clone(),
        }
    }

    /// Consuming variant of [`to_messages`](Self::to_messages).
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            PromptValue::Text(text) => vec![Message::user(text)],
            PromptValue::Messages(messages) => messages,
        }
    }
}

impl fmt::Display for PromptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptValue::Text(text) => f.write_str(text),
            PromptValue::Messages(messages) => {
                for (i, message) in messages.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}", message)?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for PromptValue {
    fn from(text: String) -> Self {
        PromptValue::Text(text)
    }
}

impl From<&str> for PromptValue {
    fn from(text: &str) -> Self {
        PromptValue::Text(text.to_string())
    }
}

impl From<Vec<Message>> for PromptValue {
    fn from(messages: Vec<Message>) -> Self {
        PromptValue::Messages(messages)
    }
}
