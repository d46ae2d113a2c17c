//! Server binary
//!
//! Run with: cargo run --bin corpus-rag-server

use std::path::PathBuf;

use corpus_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpus_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from CORPUS_RAG_CONFIG if set, defaults otherwise
    let config = match std::env::var_os("CORPUS_RAG_CONFIG") {
        Some(path) => RagConfig::from_file(&PathBuf::from(path))?,
        None => RagConfig::default(),
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.max_chunk_chars,
        config.chunking.overlap_chars
    );
    tracing::info!("  - Index backend: {:?}", config.vector_db.backend);

    // Probe the external capabilities so misconfiguration shows up early
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/api/tags", config.llm.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Ollama is running at {}", config.llm.base_url);
        }
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!("  1. Start: ollama serve");
            tracing::warn!(
                "  2. Pull models: ollama pull {} && ollama pull {}",
                config.llm.embed_model,
                config.llm.generate_model
            );
        }
    }
    match client
        .get(format!("{}/collections", config.vector_db.url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Vector store is running at {}", config.vector_db.url);
        }
        _ => tracing::warn!("Vector store not available at {}", config.vector_db.url),
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST   /api/documents      - Upload a document");
    println!("  GET    /api/documents/:id  - Ingestion status");
    println!("  DELETE /api/documents/:id  - Delete a document");
    println!("  POST   /api/query          - Ask a question");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
