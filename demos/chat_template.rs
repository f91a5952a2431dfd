//! Example: system/user chat template with streaming output.
//!
//! Run with: `OPENAI_API_KEY=sk-... cargo run --example chat_template`

use prompt_pipe::{ChatModel, ChatPromptTemplate, ModelSettings, Provider, Role, StageValue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let model = ModelSettings::new(Provider::OpenAi)
        .with_temperature(0.2)
        .api_key_from_env()
        .build()?;

    let template = ChatPromptTemplate::from_messages([
        (Role::System, "Translate the following from English into {language}"),
        (Role::User, "{text}"),
    ])?;
    println!("variables: {:?}", template.input_variables());

    let prompt = template.format_value(&StageValue::map([
        ("language", "italian"),
        ("text", "What time is it?"),
    ]))?;
    println!("{}\n", prompt);

    let response = model
        .stream(&prompt.to_messages(), &mut |token: String| print!("{}|", token))
        .await?;
    println!("\n\n{} chars from {:?}", response.content.len(), response.model);
    Ok(())
}
