//! Example: a template → model → parser chain with MockChatModel, no network.
//!
//! Run with: `cargo run --example mock_chain`

use prompt_pipe::{Invoker, MockChatModel, PromptTemplate, StageExt, StageValue, StrOutputParser};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockChatModel::new(vec![
        "Why did the cat sit on the computer? To keep an eye on the mouse.".to_string(),
        "Dogs can't operate MRI machines, but catscan.".to_string(),
    ]));

    let chain = PromptTemplate::from_template("Tell me a joke about {topic}")?
        .pipe(Invoker::new(mock.clone()))
        .pipe(StrOutputParser::new().trimmed());

    for topic in ["cats", "dogs"] {
        let output = chain.invoke(StageValue::map([("topic", topic)])).await?;
        println!("{}: {}", topic, output);
    }

    // Every intermediate value, stage by stage
    let steps = chain.invoke_all(StageValue::map([("topic", "owls")])).await?;
    for (i, step) in steps.iter().enumerate() {
        println!("step {} [{}]: {}", i, step.kind(), step);
    }

    println!("prompts sent: {}", mock.requests().len());
    Ok(())
}
