//! Prompt templates with `{name}` placeholders.
//!
//! [`PromptTemplate`] renders a single string; [`ChatPromptTemplate`] renders
//! an ordered list of role-tagged messages. Both scan their pattern once at
//! construction, so malformed templates fail early and the placeholder set
//! is known before any render.
//!
//! Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
//! Placeholder names are taken verbatim and may not contain whitespace,
//! so `{ topic }` is rejected rather than bound to `topic`.

use crate::error::{ChainError, Result};
use crate::message::{Message, PromptValue, Role};
use crate::stage::{BoxFut, Stage};
use crate::value::StageValue;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

fn invalid(template: &str, reason: &str) -> ChainError {
    ChainError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    match n {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(invalid(template, "'{' inside a placeholder")),
                        other => name.push(other),
                    }
                }
                if !closed {
                    return Err(invalid(template, "unclosed '{'"));
                }
                if name.is_empty() {
                    return Err(invalid(template, "empty placeholder '{}'"));
                }
                if name.chars().any(char::is_whitespace) {
                    return Err(invalid(template, "whitespace inside a placeholder"));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => return Err(invalid(template, "single '}' outside a placeholder")),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Bind a stage input to template values.
///
/// Maps are rendered key by key. Any other value is accepted only when the
/// template has exactly one open placeholder.
fn bind_input(stage: &str, variables: &[&str], input: &StageValue) -> Result<HashMap<String, String>> {
    match input {
        StageValue::Map(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), v.to_prompt_text()))
            .collect()),
        other if variables.len() == 1 => Ok(HashMap::from([(
            variables[0].to_string(),
            other.to_prompt_text(),
        )])),
        other => Err(ChainError::InvalidInput {
            stage: stage.to_string(),
            expected: "map",
            found: other.kind(),
        }),
    }
}

/// A string template with named placeholders.
///
/// # Example
///
/// ```
/// use prompt_pipe::PromptTemplate;
/// use std::collections::HashMap;
///
/// let template = PromptTemplate::from_template("Tell me a joke about {topic}").unwrap();
/// let values = HashMap::from([("topic".to_string(), "cats".to_string())]);
/// assert_eq!(template.render(&values).unwrap(), "Tell me a joke about cats");
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    template: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
    partials: HashMap<String, String>,
}

impl PromptTemplate {
    /// Parse a template. Fails on unbalanced braces or empty placeholders.
    pub fn from_template(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let segments = parse_segments(&template)?;
        let mut variables: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder(name) = segment {
                if !variables.contains(name) {
                    variables.push(name.clone());
                }
            }
        }
        Ok(Self {
            name: "prompt".to_string(),
            template,
            segments,
            variables,
            partials: HashMap::new(),
        })
    }

    /// Set the instance name used in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pre-bind a placeholder. Values passed to [`render`](Self::render) win.
    pub fn with_partial(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.partials.insert(key.into(), value.into());
        self
    }

    /// The raw pattern.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholders still expected from the caller, in order of first appearance.
    pub fn input_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| !self.partials.contains_key(*v))
            .map(String::as_str)
            .collect()
    }

    /// Substitute every placeholder.
    ///
    /// Extra keys in `values` are ignored. The first placeholder (in pattern
    /// order) without a value fails with [`ChainError::MissingPlaceholder`].
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String> {
        let mut rendered = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .get(name)
                        .or_else(|| self.partials.get(name))
                        .ok_or_else(|| ChainError::MissingPlaceholder(name.clone()))?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }

    /// Render a stage input into a text prompt.
    pub fn format_value(&self, input: &StageValue) -> Result<PromptValue> {
        let values = bind_input(&self.name, &self.input_variables(), input)?;
        self.render(&values).map(PromptValue::Text)
    }
}

impl Stage for PromptTemplate {
    fn kind(&self) -> &'static str {
        "prompt-template"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(async move { self.format_value(&input).map(StageValue::Prompt) })
    }
}

/// An ordered list of role-tagged message templates.
///
/// # Example
///
/// ```
/// use prompt_pipe::{ChatPromptTemplate, Role};
/// use std::collections::HashMap;
///
/// let template = ChatPromptTemplate::from_messages([
///     (Role::System, "Translate the following from English into {language}"),
///     (Role::User, "{text}"),
/// ])
/// .unwrap();
///
/// let values = HashMap::from([
///     ("language".to_string(), "arabic".to_string()),
///     ("text".to_string(), "hi!".to_string()),
/// ]);
/// let messages = template.render(&values).unwrap();
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[1].content, "hi!");
/// ```
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    name: String,
    messages: Vec<(Role, PromptTemplate)>,
}

impl ChatPromptTemplate {
    pub fn from_messages<I, S>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Role, S)>,
        S: AsRef<str>,
    {
        let messages = messages
            .into_iter()
            .map(|(role, pattern)| Ok((role, PromptTemplate::from_template(pattern.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: "chat-prompt".to_string(),
            messages,
        })
    }

    /// Load from a YAML document of the form
    /// `messages: [{role: system, template: "..."}]`.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        #[derive(serde::Deserialize)]
        struct Doc {
            messages: Vec<MessageDoc>,
        }
        #[derive(serde::Deserialize)]
        struct MessageDoc {
            role: Role,
            template: String,
        }

        let doc: Doc = serde_yaml::from_str(source)?;
        Self::from_messages(doc.messages.into_iter().map(|m| (m.role, m.template)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Union of every message's placeholders, in order of first appearance.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (_, template) in &self.messages {
            for var in template.input_variables() {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        out
    }

    /// Render every message, preserving order and roles.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<Vec<Message>> {
        self.messages
            .iter()
            .map(|(role, template)| Ok(Message::new(*role, template.render(values)?)))
            .collect()
    }

    /// Render a stage input into a message-list prompt.
    pub fn format_value(&self, input: &StageValue) -> Result<PromptValue> {
        let values = bind_input(&self.name, &self.input_variables(), input)?;
        self.render(&values).map(PromptValue::Messages)
    }
}

impl Stage for ChatPromptTemplate {
    fn kind(&self) -> &'static str {
        "chat-prompt-template"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, input: StageValue) -> BoxFut<'a, Result<StageValue>> {
        Box::pin(async move { self.format_value(&input).map(StageValue::Prompt) })
    }
}
