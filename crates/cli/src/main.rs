//! Citeforge command line driver
//!
//! Runs a citation query over local passages without a real language model:
//! the model echoes the rendered prompt, so the output shows exactly what a
//! model would be asked and which numbered sources it would see.

use anyhow::Context;
use citeforge_common::{
    callbacks::TracingHandler,
    config::AppConfig,
    errors::Result as AppResult,
    metrics::register_metrics,
    schema::{Passage, QueryBundle},
    VERSION,
};
use citeforge_engine::{
    split_document, CitationQueryEngine, Document, LanguageModel, OverlapSplitter, Retriever,
    Splitter, StaticRetriever,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "citeforge")]
#[command(version, about = "Dry-run a citation query over local passages")]
struct Args {
    /// JSON file with an array of scored passages
    #[arg(long, conflicts_with = "document", required_unless_present = "document")]
    passages: Option<PathBuf>,

    /// Plain text document, split into passages with the source splitter
    #[arg(long)]
    document: Option<PathBuf>,

    /// Keep only the first N passages
    #[arg(long)]
    top_k: Option<usize>,

    /// Run the query on the async path
    #[arg(long = "async")]
    run_async: bool,

    /// Configuration file (default: config/ layering plus APP__ variables)
    #[arg(long)]
    config: Option<String>,

    /// Question to answer
    query: String,
}

/// Answers with the prompt it was given
struct PromptEcho;

impl LanguageModel for PromptEcho {
    fn predict(&self, prompt: &str) -> AppResult<String> {
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "prompt-echo"
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(service = %config.observability.service_name, "Starting Citeforge v{}", VERSION);
    register_metrics();

    let source_splitter: Arc<dyn Splitter> = Arc::new(OverlapSplitter::new(&config.source)?);
    let passages = match (&args.passages, &args.document) {
        (Some(path), _) => read_passages(path)?,
        (None, Some(path)) => read_document(path, source_splitter.as_ref())?,
        (None, None) => anyhow::bail!("either --passages or --document is required"),
    };

    let mut retriever = StaticRetriever::new(passages);
    if let Some(top_k) = args.top_k {
        retriever = retriever.with_top_k(top_k);
    }
    let retriever: Arc<dyn Retriever> = Arc::new(retriever);

    let engine = CitationQueryEngine::builder(retriever)
        .language_model(Arc::new(PromptEcho))
        .synthesis_config(config.synthesis.clone())
        .source_splitter(source_splitter)
        .citation_chunking(config.citation.clone())
        .callback_handler(Arc::new(TracingHandler))
        .build()?;

    let query = QueryBundle::new(args.query);
    let response = if args.run_async {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(engine.aquery(query))?
    } else {
        engine.query(query)?
    };

    println!("Rendered prompt:\n{}\n", response);
    println!("Sources:\n{}", response.formatted_sources(100));
    Ok(())
}

fn read_passages(path: &Path) -> anyhow::Result<Vec<Passage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read passages from {}", path.display()))?;
    let passages: Vec<Passage> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid passage JSON in {}", path.display()))?;

    info!(passage_count = passages.len(), "Loaded passages");
    Ok(passages)
}

fn read_document(path: &Path, splitter: &dyn Splitter) -> anyhow::Result<Vec<Passage>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;

    let mut document = Document::new(text);
    if let Some(name) = path.file_name() {
        document = document.with_id(name.to_string_lossy());
    }

    let passages = split_document(&document, splitter);
    info!(passage_count = passages.len(), "Split document into passages");
    Ok(passages)
}
