use std::{path::PathBuf, sync::Arc};

use archive::{retrieval::RetrievalEngine, storage::QdrantStore};
use chat::{client::gemini::GeminiChat, context::RetrievalClient, engine::ChatEngine};
use config::store::RagConfig;
use server::state::AppState;
use tokio::net::TcpListener;
use utils::log::Logger;

mod archive;
mod chat;
mod config;
mod server;
mod utils;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::var("DOCS_RAG_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = RagConfig::read(PathBuf::from(path))?;

    Logger::init(Logger::level(config.server.log_level.as_deref()));
    log::info!("loaded config from {}", config.path.display());

    let embedding_key = config
        .embedding
        .api_key
        .clone()
        .unwrap_or_else(|| config.llm.api_key.clone());
    let embedder = config
        .embedding
        .provider
        .client(&embedding_key, config.embedding.base_url.as_deref())
        .embedding_model(&config.embedding.model);
    log::info!(
        "embedding with {} model {}",
        config.embedding.provider,
        config.embedding.model
    );

    let store = Arc::new(QdrantStore::new(config.store.clone()));
    let retrieval = Arc::new(RetrievalEngine::new(
        store,
        Arc::from(embedder),
        &config.retrieval,
    ));

    let chat = ChatEngine::new(
        Arc::new(RetrievalClient::new(config.retrieval.endpoint.clone())),
        Arc::new(GeminiChat::new(&config.llm)),
        config.prompt.clone(),
    );

    let app = server::router(AppState::new(retrieval.clone(), chat));

    let listener = TcpListener::bind(&config.server.bind).await?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    retrieval.shutdown().await;
    log::info!("store connection closed, bye");

    Ok(())
}
