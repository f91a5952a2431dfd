//! # Prompt Pipe
//!
//! Composable building blocks for calling hosted chat models: prompt
//! templates, a model invoker, output parsers, and sequential chains.
//!
//! ## Core Concepts
//!
//! - **[`PromptTemplate`] / [`ChatPromptTemplate`]**: `{name}` placeholder
//!   templates rendering to a string or to role-tagged [`Message`]s.
//! - **[`ChatModel`]**: object-safe provider trait; [`OpenAiChatModel`]
//!   talks to any OpenAI-compatible endpoint, [`MockChatModel`] and
//!   [`FnChatModel`] are deterministic stand-ins.
//! - **[`Invoker`]**: wraps a model as a pipeline stage.
//! - **[`StrOutputParser`]**: pulls the text out of a [`ModelResponse`].
//! - **[`Chain`]**: sequential composition of [`Stage`]s; [`StageMap`]
//!   fans one input out to several stages.
//! - **[`StageValue`]**: the value passed between stages.
//!
//! ## Quick Start
//!
//! ```
//! use prompt_pipe::{Invoker, MockChatModel, PromptTemplate, StageExt, StageValue, StrOutputParser};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = PromptTemplate::from_template("Tell me a joke about {topic}")?
//!         .pipe(Invoker::from_model(MockChatModel::fixed("Why did the cat sit on the computer?")))
//!         .pipe(StrOutputParser::new());
//!
//!     let output = chain.invoke(StageValue::map([("topic", "cats")])).await?;
//!     assert_eq!(output.as_text(), Some("Why did the cat sit on the computer?"));
//!     Ok(())
//! }
//! ```
//!
//! ## Cascading chains
//!
//! A [`StageMap`] runs a sub-chain and feeds its result into the next
//! template's placeholder:
//!
//! ```ignore
//! let composed = StageMap::new()
//!     .with("wrestler_name", fact_chain)
//!     .pipe(PromptTemplate::from_template("Give me a career summary of {wrestler_name}")?)
//!     .pipe(Invoker::new(model))
//!     .pipe(StrOutputParser::new());
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod stage;
pub mod value;

pub use chain::{compose, Chain};
pub use config::{ModelSettings, Provider};
pub use error::{ChainError, InvocationError, Result};
pub use message::{Message, PromptValue, Role};
pub use model::{ChatModel, FnChatModel, Invoker, MockChatModel, ModelConfig, ModelResponse, OpenAiChatModel};
pub use parser::StrOutputParser;
pub use prompt::{ChatPromptTemplate, PromptTemplate};
pub use stage::{BoxFut, Lambda, Pick, Stage, StageExt, StageMap};
pub use value::StageValue;
