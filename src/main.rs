use anyhow::Result;
use kgquery::engine::SAMPLE_QUERIES;
use kgquery::image::ImageGenerator;
use kgquery::server::HttpServer;
use kgquery::{Config, GraphRecords, QueryEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("stats");

    match command {
        "serve" => run_http_server().await?,
        "context" => print_context(),
        "samples" => print_samples(),
        "stats" | _ => print_stats(),
    }

    Ok(())
}

/// Run the HTTP API
async fn run_http_server() -> Result<()> {
    log::info!("Starting kgquery HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let records = GraphRecords::financial_reference();
    let engine = QueryEngine::from_config(&records, &config.llm);
    let images = ImageGenerator::from_config(&config.images);

    match engine.backend_label() {
        Some(label) => log::info!("Text generation: {}", label),
        None => log::warn!("No text-generation backend bound; queries will return errors"),
    }

    let server = HttpServer::new(engine, images, config);
    server.run().await?;

    Ok(())
}

/// Graph statistics need no backend, so the engine is bypassed here.
fn print_stats() {
    let graph = kgquery::GraphStore::build(&GraphRecords::financial_reference());
    let stats = graph.stats();

    println!("\n=== Knowledge Graph Statistics ===\n");
    println!("Total nodes:         {}", stats.num_nodes);
    println!("Total relationships: {}", stats.num_edges);

    println!("\nNodes:");
    println!("{:-<60}", "");
    for node in graph.nodes() {
        println!(
            "{:<30} {:<20}",
            node.id,
            node.node_type.as_deref().unwrap_or("unknown")
        );
    }

    println!("\nRelationships:");
    println!("{:-<60}", "");
    println!("{:<20} {:<16} {:<20}", "Source", "Relationship", "Target");
    println!("{:-<60}", "");
    for (source, target, relation) in &stats.edges {
        println!("{:<20} {:<16} {:<20}", source, relation, target);
    }
    println!();
}

fn print_context() {
    let graph = kgquery::GraphStore::build(&GraphRecords::financial_reference());
    println!("{}", kgquery::graph::serialize_context(&graph));
}

fn print_samples() {
    for (i, sample) in SAMPLE_QUERIES.iter().enumerate() {
        println!("{}. {}", i + 1, sample);
    }
}
