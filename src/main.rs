//! Tutorial walk-through: templates, model calls, parsers, and chains
//! against a hosted chat model.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;
use prompt_pipe::{
    ChatModel, ChatPromptTemplate, Invoker, ModelSettings, PromptTemplate, Provider, Role,
    StageExt, StageMap, StageValue, StrOutputParser,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Prompt templates, model calls, and chains against a hosted chat model
#[derive(Parser, Debug)]
#[command(name = "prompt-pipe", version, about)]
struct Cli {
    /// Provider: gemini or openai
    #[arg(long, env = "PROMPT_PIPE_PROVIDER", default_value = "gemini")]
    provider: Provider,

    /// Model id (defaults to the provider's default)
    #[arg(long, env = "PROMPT_PIPE_MODEL")]
    model: Option<String>,

    /// Override the OpenAI-compatible base URL
    #[arg(long, env = "PROMPT_PIPE_BASE_URL")]
    base_url: Option<String>,

    /// API key (falls back to GOOGLE_API_KEY / OPENAI_API_KEY, then a prompt)
    #[arg(long)]
    api_key: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 1.0)]
    temperature: f64,

    /// Maximum tokens per completion
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Stream the translation section token by token
    #[arg(long)]
    stream: bool,

    /// Target language for the translation section
    #[arg(long, default_value = "arabic")]
    language: String,

    /// Text to translate
    #[arg(long, default_value = "hi!")]
    text: String,

    /// Topic for the joke section
    #[arg(long, default_value = "cats")]
    topic: String,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "prompt_pipe=info",
        _ => "prompt_pipe=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve settings from flags and environment; prompt for the key only as a last resort.
fn resolve_settings(cli: &Cli) -> Result<ModelSettings> {
    let mut settings = ModelSettings::new(cli.provider)
        .with_temperature(cli.temperature)
        .with_max_tokens(cli.max_tokens)
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(ref model) = cli.model {
        settings = settings.with_model(model.clone());
    }
    if let Some(ref base_url) = cli.base_url {
        settings = settings.with_base_url(base_url.clone());
    }
    if let Some(ref key) = cli.api_key {
        settings = settings.with_api_key(key.clone());
    }
    settings = settings.api_key_from_env();

    if !settings.has_api_key() {
        let key = Password::new()
            .with_prompt(format!(
                "Enter API key for {}",
                cli.provider.display_name()
            ))
            .interact()
            .context("failed to read API key")?;
        settings = settings.with_api_key(key);
    }

    tracing::info!(?settings, "model settings resolved");
    Ok(settings)
}

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Write one streamed token followed by a `|` separator and flush it.
fn write_token(out: &mut impl Write, token: &str) -> std::io::Result<()> {
    write!(out, "{}|", token)?;
    out.flush()
}

fn banner(title: &str) {
    println!("========================={}=========================", title);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = resolve_settings(&cli)?;
    let model: Arc<dyn ChatModel> = Arc::new(settings.build()?);
    let invoker = Invoker::new(model.clone());

    banner("PROMPT TEMPLATE FROM MESSAGES");
    let translate = ChatPromptTemplate::from_messages([
        (Role::System, "Translate the following from English into {language}"),
        (Role::User, "{text}"),
    ])?;
    let messages = translate.render(&vars(&[
        ("language", cli.language.as_str()),
        ("text", cli.text.as_str()),
    ]))?;
    println!("{:?}", messages);
    if cli.stream {
        let mut stdout = std::io::stdout();
        let mut written: std::io::Result<()> = Ok(());
        model
            .stream(&messages, &mut |token: String| {
                if written.is_ok() {
                    written = write_token(&mut stdout, &token);
                }
            })
            .await?;
        written.context("failed to write streamed tokens to stdout")?;
        println!();
    } else {
        let response = invoker.call(messages).await?;
        println!("{}", response.content);
    }

    banner("PROMPT TEMPLATE FROM TEMPLATES");
    let joke = PromptTemplate::from_template("Tell me a joke about {topic}")?;
    let prompt = joke.render(&vars(&[("topic", cli.topic.as_str())]))?;
    println!("{}", invoker.call(prompt).await?.content);

    let fact = PromptTemplate::from_template(
        "Give me one good facts about {wrestler_name} in {wrestling_company}",
    )?;
    let prompt = fact.render(&vars(&[
        ("wrestler_name", "roman reigns"),
        ("wrestling_company", "wwe"),
    ]))?;
    println!("{}", invoker.call(prompt).await?.content);

    banner("RUNNABLES");
    let fact_chain = fact
        .with_name("wrestler-fact")
        .pipe(invoker.clone())
        .pipe(StrOutputParser::new())
        .with_name("fact-chain");
    let output = fact_chain
        .invoke(StageValue::map([
            ("wrestler_name", "cody rhodes"),
            ("wrestling_company", "aew"),
        ]))
        .await?;
    println!("{}", output);

    banner("CASCADING CHAINS");
    let career = PromptTemplate::from_template("Give me a career summary of {wrestler_name}")?
        .with_name("career-summary");
    let composed = StageMap::new()
        .with("wrestler_name", fact_chain)
        .pipe(career)
        .pipe(invoker)
        .pipe(StrOutputParser::new())
        .with_name("cascading-chain");
    // Every placeholder of the first chain must be in the initial input.
    let output = composed
        .invoke(StageValue::map([
            ("wrestler_name", "Dean Ambrose"),
            ("wrestling_company", "aew"),
        ]))
        .await?;
    println!("{}", output);

    Ok(())
}
