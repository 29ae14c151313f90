//! Retrieval-augmented chat over Confluence wiki content.

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;

use confab_index::{
    Answerer, ChunkStore, ConfluenceClient, Credentials, Ingestor, Mode, Selection,
    default_http_client, format_outcome,
};
use confab_llm::{Message, OllamaProvider};
use confab_store::QdrantStore;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "confab",
    version,
    about = "Retrieval-augmented chat over wiki pages"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "confab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the chunk collection from wiki pages.
    Create {
        /// Ingest every page of this space.
        #[arg(long)]
        space_key: Option<String>,
        /// Ingest a specific page; repeatable.
        #[arg(long = "page-id")]
        page_ids: Vec<String>,
    },
    /// Add wiki pages to the existing collection.
    Update {
        /// Ingest every page of this space.
        #[arg(long)]
        space_key: Option<String>,
        /// Ingest a specific page; repeatable.
        #[arg(long = "page-id")]
        page_ids: Vec<String>,
    },
    /// Ask questions over the indexed pages.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Create {
            space_key,
            page_ids,
        } => ingest(&config, Mode::Create, space_key, page_ids).await,
        Command::Update {
            space_key,
            page_ids,
        } => ingest(&config, Mode::Update, space_key, page_ids).await,
        Command::Chat => chat(&config).await,
    }
}

fn build_provider(config: &Config) -> Arc<OllamaProvider> {
    Arc::new(OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    ))
}

fn build_store(
    config: &Config,
    provider: &Arc<OllamaProvider>,
) -> anyhow::Result<ChunkStore<OllamaProvider>> {
    let backend =
        QdrantStore::new(&config.store.qdrant_url).context("failed to connect to Qdrant")?;
    Ok(ChunkStore::new(
        Arc::new(backend),
        Arc::clone(provider),
        config.store.collection.clone(),
    ))
}

async fn ingest(
    config: &Config,
    mode: Mode,
    space_key: Option<String>,
    page_ids: Vec<String>,
) -> anyhow::Result<()> {
    // Validated before any client or store is constructed.
    let selection = Selection::new(space_key, page_ids)?;
    let credentials = Credentials::from_env()?;

    let http = default_http_client();
    let client = ConfluenceClient::new(&http, &config.confluence.base_url, credentials);
    let provider = build_provider(config);
    let store = build_store(config, &provider)?;

    let ingestor = Ingestor::new(&client, &store, config.chunker());
    let report = ingestor.run(mode, &selection).await?;
    println!(
        "Indexed {} chunks from {} pages into {}",
        report.chunks,
        report.documents,
        store.collection()
    );
    Ok(())
}

async fn chat(config: &Config) -> anyhow::Result<()> {
    let provider = build_provider(config);
    provider
        .health_check()
        .await
        .context("Ollama is not reachable")?;
    let store = build_store(config, &provider)?;
    let answerer = Answerer::new(Arc::clone(&provider), store);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<Message> = Vec::new();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        match answerer.answer(trimmed, &mut history).await {
            Ok(outcome) => {
                println!("{}", format_outcome(&outcome));
                history.push(Message::assistant(outcome.answer));
            }
            Err(e) => error!("turn failed: {e}"),
        }
    }
    Ok(())
}
