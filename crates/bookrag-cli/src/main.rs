//! bookrag CLI - Command-line interface
//!
//! Usage:
//!   bookrag ingest [--path <dir>] [--force]
//!   bookrag query <question> [--top-k <n>] [--selected-text <text>]
//!   bookrag config

use anyhow::Context;
use bookrag_content::ContentLoader;
use bookrag_core::AppConfig;
use bookrag_rag::{ChatRequest, ChatService, IngestionPipeline, OpenAiClient, RetrievalService};
use bookrag_vector::{create_vector_store, OpenAiEmbedding};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bookrag")]
#[command(about = "Ask questions about the book from the command line")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index the book content
    Ingest {
        /// Content directory (defaults to BOOK_CONTENT_PATH)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Clear the index before ingesting
        #[arg(long)]
        force: bool,
    },
    /// Ask a question about the book
    Query {
        /// Question to ask
        text: String,

        /// Number of chunks to retrieve
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=20))]
        top_k: Option<u16>,

        /// Answer from this passage instead of the whole book
        #[arg(long)]
        selected_text: Option<String>,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bookrag={level},bookrag_rag={level},bookrag_vector={level},bookrag_content={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging.level);

    match cli.command {
        Commands::Ingest { path, force } => {
            if let Some(path) = path {
                config.content.book_content_path = path;
            }
            config.validate()?;
            ingest(&config, force).await?;
        }
        Commands::Query {
            text,
            top_k,
            selected_text,
        } => {
            config.validate()?;
            let request = ChatRequest {
                text,
                selected_text,
                top_k: top_k.map(usize::from).unwrap_or(0),
                ..Default::default()
            };
            query(&config, &request).await?;
        }
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

async fn ingest(config: &AppConfig, force: bool) -> anyhow::Result<()> {
    let embedder = Arc::new(OpenAiEmbedding::from_config(&config.llm)?);
    let store = create_vector_store(&config.vector).await?;
    let pipeline = IngestionPipeline::new(
        ContentLoader::new(&config.content.book_content_path),
        embedder,
        store.clone(),
    )
    .with_batch_size(config.llm.embedding_batch_size);

    println!(
        "Ingesting book content from: {}",
        config.content.book_content_path.display()
    );
    let report = pipeline.run(force).await?;

    println!(
        "Indexed {} chunks from {} files into the {} store",
        report.chunks,
        report.files,
        store.name()
    );
    if report.used_sample {
        println!("No book content found; indexed the built-in sample content");
    }
    Ok(())
}

async fn query(config: &AppConfig, request: &ChatRequest) -> anyhow::Result<()> {
    let embedder = Arc::new(OpenAiEmbedding::from_config(&config.llm)?);
    let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);
    let store = create_vector_store(&config.vector).await?;

    let retrieval = RetrievalService::new(embedder, store, config.retrieval.min_similarity);
    let chat = ChatService::new(retrieval, llm, config.retrieval.clone());

    let response = chat.answer(request).await?;

    println!("{}\n", response.text);
    if !response.sources.is_empty() {
        println!("Sources:");
    }
    for (i, source) in response.sources.iter().enumerate() {
        let meta = &source.metadata;
        let section = meta.section.as_deref().unwrap_or("-");
        let relevance = meta.relevance.unwrap_or_default();
        println!(
            "  [{}] {} / {} (relevance {:.3})",
            i + 1,
            meta.file_path,
            section,
            relevance
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::parse_from([
            "bookrag",
            "--config",
            "bookrag.toml",
            "query",
            "How do robots walk?",
            "--top-k",
            "3",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("bookrag.toml")));
        match cli.command {
            Commands::Query {
                text,
                top_k,
                selected_text,
            } => {
                assert_eq!(text, "How do robots walk?");
                assert_eq!(top_k, Some(3));
                assert!(selected_text.is_none());
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_top_k_out_of_range() {
        assert!(Cli::try_parse_from(["bookrag", "query", "q", "--top-k", "21"]).is_err());
        assert!(Cli::try_parse_from(["bookrag", "query", "q", "--top-k", "0"]).is_err());
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from(["bookrag", "ingest", "--path", "docs", "--force"]);
        match cli.command {
            Commands::Ingest { path, force } => {
                assert_eq!(path, Some(PathBuf::from("docs")));
                assert!(force);
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn test_config_renders_without_secrets() {
        let mut config = AppConfig::default();
        config.security.api_key = Some("cli-secret-key".into());
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("cli-secret-key"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
