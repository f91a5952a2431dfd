//! Example: one chain's output seeds another chain's placeholder.
//!
//! Uses the hosted model when `GOOGLE_API_KEY` is set, otherwise a mock.
//!
//! Run with: `cargo run --example cascading_chain`

use prompt_pipe::{
    ChatModel, Invoker, MockChatModel, ModelSettings, Pick, PromptTemplate, Provider, StageExt,
    StageMap, StageValue, StrOutputParser,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("prompt_pipe=debug"))
        .init();

    let settings = ModelSettings::new(Provider::Gemini).api_key_from_env();
    let model: Arc<dyn ChatModel> = if settings.has_api_key() {
        Arc::new(settings.build()?)
    } else {
        Arc::new(MockChatModel::new(vec![
            "Cody Rhodes".to_string(),
            "A third-generation wrestler who left and came back on top.".to_string(),
        ]))
    };
    let invoker = Invoker::new(model);

    let name_chain = PromptTemplate::from_template(
        "Name one famous wrestler from {wrestling_company}. Reply with the name only.",
    )?
    .pipe(invoker.clone())
    .pipe(StrOutputParser::new().trimmed());

    // The company is forwarded from the initial input next to the sub-chain result.
    let composed = StageMap::new()
        .with("wrestler_name", name_chain)
        .with("wrestling_company", Pick::key("wrestling_company"))
        .pipe(PromptTemplate::from_template(
            "Give me a career summary of {wrestler_name} in {wrestling_company}",
        )?)
        .pipe(invoker)
        .pipe(StrOutputParser::new());

    let output = composed
        .invoke(StageValue::map([("wrestling_company", "aew")]))
        .await?;
    println!("{}", output);
    Ok(())
}
