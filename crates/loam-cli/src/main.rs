//! `loam` binary: thin shell over the engine's programmatic surface.

mod cli;
mod commands;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use loam_config::LoamConfig;
use loam_core::{ChatService, EmbeddingCache, SemanticService};
use loam_engine::Engine;
use loam_llm::HttpChatProvider;
use loam_rpc::SemanticClient;
use loam_sqlite::SqliteEmbeddingCache;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut config =
        LoamConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(garden) = &args.garden {
        config.notes_root = garden.clone();
    }

    let engine = build_engine(config)?;
    match args.command {
        Command::Scan => commands::scan(&engine).await,
        Command::Plan => commands::plan(&engine).await,
        Command::Tend { safe_only } => commands::tend(&engine, safe_only).await,
        Command::Proposals(cmd) => commands::proposals(&engine, cmd),
    }
}

fn build_engine(config: LoamConfig) -> Result<Engine> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    let semantic: Option<Arc<dyn SemanticService>> = config
        .semantic_service_base_url
        .as_ref()
        .map(|url| SemanticClient::new(url.clone(), timeout))
        .transpose()
        .context("failed to build semantic client")?
        .map(|client| Arc::new(client) as Arc<dyn SemanticService>);

    let chat: Option<Arc<dyn ChatService>> = config
        .chat_service_base_url
        .as_ref()
        .map(|url| HttpChatProvider::new(url.clone(), config.chat_model.clone(), timeout))
        .transpose()
        .context("failed to build chat client")?
        .map(|provider| Arc::new(provider) as Arc<dyn ChatService>);

    let cache = SqliteEmbeddingCache::open(&config.embeddings_db_path())
        .context("failed to open embedding cache")?;

    Engine::new(
        config,
        semantic,
        chat,
        Arc::new(cache) as Arc<dyn EmbeddingCache>,
    )
    .context("failed to initialize engine")
}
