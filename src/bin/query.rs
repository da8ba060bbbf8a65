use anyhow::Result;
use clap::Parser;
use kgquery::engine::SAMPLE_QUERIES;
use kgquery::llm::BackendKind;
use kgquery::{Config, GraphRecords, QueryEngine};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Ask a financial question against the knowledge graph")]
struct Args {
    /// Question to ask (omit when using --sample)
    question: Option<String>,

    /// Use one of the built-in sample questions (1-4)
    #[arg(short, long)]
    sample: Option<usize>,

    /// Primary LLM provider: huggingface, ollama or openai
    #[arg(short, long)]
    provider: Option<BackendKind>,

    /// Model for the primary provider
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature between 0.0 and 1.0
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Print the graph context sent with the question
    #[arg(long)]
    show_context: bool,
}

fn resolve_question(args: &Args) -> Result<String> {
    if let Some(n) = args.sample {
        return SAMPLE_QUERIES
            .get(n.wrapping_sub(1))
            .map(|s| s.to_string())
            .ok_or_else(|| {
                anyhow::anyhow!("--sample must be between 1 and {}", SAMPLE_QUERIES.len())
            });
    }

    let question = args.question.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "Usage: query <question> [--provider <name>] [--model <model>] [--temperature <t>]\n\
             Example: query \"Is the car purchase feasible by year-end?\""
        )
    })?;
    if question.trim().is_empty() {
        anyhow::bail!("Please enter a query before executing.");
    }
    Ok(question)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();
    let question = resolve_question(&args)?;

    let mut config = Config::load()?;
    if let Some(provider) = args.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(temperature) = args.temperature {
        if !(0.0..=1.0).contains(&temperature) {
            anyhow::bail!("--temperature must be between 0.0 and 1.0");
        }
        config.llm.temperature = temperature;
    }

    let engine = QueryEngine::from_config(&GraphRecords::financial_reference(), &config.llm);

    if args.show_context {
        println!("{}\n", engine.serialize_context());
    }

    println!("\n{:=<70}", "");
    println!("Query: {}", question);
    if let Some(label) = engine.backend_label() {
        println!("Backend: {}", label);
    }
    println!("{:-<70}", "");

    let start = Instant::now();
    let answer = engine.query(&question).await;
    log::info!("Query completed in {:?}", start.elapsed());

    println!("{}", answer);
    println!("{:=<70}\n", "");

    Ok(())
}
