//! Research example: a searcher and a writer run in sequence.
//!
//! The searcher may call `google_search`; the writer turns the findings
//! into a short answer. Events are printed as they stream in.
//!
//! Requires OPENAI_API_KEY. An engine config may be named by ARBOR_CONFIG.
//! Run with:
//! ```sh
//! cargo run -p arbor-agent --example research -- "what is a b-tree?"
//! ```

use arbor_agent::prelude::*;
use futures_util::StreamExt;
use openai::OpenAi;
use std::{io::Write, path::Path, sync::Arc};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "What is a b-tree?".into());

    let mut config = match std::env::var("ARBOR_CONFIG") {
        Ok(path) => EngineConfig::load(Path::new(&path))?,
        Err(_) => EngineConfig::default(),
    };
    config.default_model.get_or_insert_with(|| DEFAULT_MODEL.to_owned());
    let buffer = config.stream_buffer;

    let registry = Registry::new();
    registry.register_all(openai::SUPPORTED_MODELS, move |model| {
        Ok(Arc::new(OpenAi::from_env(model)?.with_buffer(buffer)) as Arc<dyn Llm>)
    })?;
    registry.log_registered();
    let registry = Arc::new(registry);

    let searcher = Agent::builder("searcher")
        .description("Finds sources for a question")
        .build(
            LlmAgent::from_config(registry.clone(), &config)?
                .instruction("Search the web for the question and list what you find.")
                .tool(GoogleSearch),
        )?;
    let writer = Agent::builder("writer")
        .description("Writes the final answer")
        .build(
            LlmAgent::from_config(registry, &config)?
                .instruction("Answer the original question in three sentences using the findings."),
        )?;
    let root = Agent::builder("research")
        .children([searcher, writer])
        .build(Sequential)?;
    tracing::info!("research tree ready: {root:?}");

    let ctx = InvocationContext::new(vec![Message::user(question)])
        .config(RunConfig::streaming(StreamingMode::Sse));
    let mut events = root.run_streaming(ctx);
    while let Some(event) = events.next().await {
        match event? {
            Event::Partial { response, .. } => {
                print!("{}", response.content.unwrap_or_default());
                std::io::stdout().flush()?;
            }
            Event::Message { author, message } => println!("\n[{author}] {}", message.text()),
            Event::Exit { .. } => {}
        }
    }
    Ok(())
}
