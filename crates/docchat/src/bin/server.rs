//! Docchat server binary
//!
//! Run with: cargo run -p docchat --bin docchat-server
//! Set DOCCHAT_CONFIG to a TOML file and LLM_PROVIDER to pick the primary provider.

use docchat::{config::RagConfig, server::DocchatServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {} ({}D)", config.embeddings.model, config.embeddings.dimensions);
    tracing::info!("  - LLM: {} ({})", config.llm.primary.name, config.llm.primary.model);
    if let Some(fallback) = &config.llm.fallback {
        tracing::info!("  - LLM fallback: {} ({})", fallback.name, fallback.model);
    }
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Sessions: max {}, idle ttl {}s",
        config.sessions.max_sessions,
        config.sessions.ttl_secs
    );

    let server = DocchatServer::new(config)?;

    if !server.state().embedder().health_check().await.unwrap_or(false) {
        tracing::warn!(
            "Embedding provider not reachable at {}; indexing will fail until it is",
            server.state().config().embeddings.base_url
        );
    }

    tracing::info!("Endpoints:");
    tracing::info!("  POST   /chat/index          - Upload documents");
    tracing::info!("  POST   /chat/query          - Ask questions");
    tracing::info!("  GET    /chat/jobs/:id       - Ingestion progress");
    tracing::info!("  GET    /chat/sessions/:id   - Session status");
    tracing::info!("  DELETE /chat/sessions/:id   - Drop a session");

    server.start().await?;

    Ok(())
}
