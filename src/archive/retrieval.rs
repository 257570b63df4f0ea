use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{sync::OnceCell, task::JoinHandle};

use crate::{chat::client::providers::DynEmbeddingModel, config::structure::RetrievalConfig};

use super::{
    mmr::{MmrConfig, mmr_select},
    storage::DocumentStore,
};

/// Full-text hits logged by the diagnostic search.
const DIAGNOSTIC_LIMIT: u32 = 10;

/// A chunk of documentation handed to the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Body of a successful `/api/vectorSearch` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Passage>,
}

pub struct RetrievalEngine {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn DynEmbeddingModel>,
    mmr: MmrConfig,
    diagnostics: bool,
    text_index: OnceCell<()>,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn DynEmbeddingModel>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            mmr: MmrConfig::new(config.k, config.fetch_k, config.lambda),
            diagnostics: config.diagnostics,
            text_index: OnceCell::new(),
        }
    }

    /// Embeds the question, pulls `fetch_k` neighbours and keeps the `k` that
    /// MMR selects.
    pub async fn search(&self, question: &str) -> anyhow::Result<Vec<Passage>> {
        self.ensure_text_index().await;

        let embedding = self.embedder.embed_query(question).await?;
        log::debug!("question embedded into {} dimensions", embedding.len());

        let candidates = self
            .store
            .nearest(embedding.clone(), self.mmr.fetch_k as u64)
            .await?;
        log::debug!("{} candidates fetched for re-ranking", candidates.len());

        let scores: Vec<f32> = candidates.iter().map(|candidate| candidate.score).collect();
        let (mut passages, vectors): (Vec<Option<Passage>>, Vec<Vec<f32>>) = candidates
            .into_iter()
            .map(|candidate| (Some(candidate.passage), candidate.vector))
            .unzip();

        let results: Vec<Passage> = mmr_select(&embedding, &vectors, self.mmr.k, self.mmr.lambda)
            .into_iter()
            .filter_map(|idx| {
                log::debug!("picked candidate #{idx} (store score {:.4})", scores[idx]);
                passages[idx].take()
            })
            .collect();

        log::info!("search for {question:?} returned {} passages", results.len());
        log::debug!(
            "formatted output: {}",
            serde_json::to_string_pretty(&results).unwrap_or_default()
        );

        if self.diagnostics {
            self.spawn_diagnostics(question.to_string());
        }

        Ok(results)
    }

    /// Best effort: the vector path doesn't depend on this index, so failures
    /// are only logged and retried on the next search.
    async fn ensure_text_index(&self) {
        let result = self
            .text_index
            .get_or_try_init(|| async {
                if self.store.ensure_text_index().await? {
                    log::info!("text index created");
                }
                anyhow::Ok(())
            })
            .await;

        if let Err(why) = result {
            log::warn!("could not ensure text index: {why:?}");
        }
    }

    fn spawn_diagnostics(&self, question: String) -> JoinHandle<()> {
        let store = self.store.clone();
        let embedder = self.embedder.clone();

        tokio::spawn(async move { run_diagnostics(store, embedder, question).await })
    }

    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

/// A plain text search and a second embedding, logged for troubleshooting
/// an empty or odd result set. Never affects the response.
async fn run_diagnostics(
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn DynEmbeddingModel>,
    question: String,
) {
    match store.text_search(&question, DIAGNOSTIC_LIMIT).await {
        Ok(hits) => log::debug!(
            "text search result: {}",
            serde_json::to_string_pretty(&hits).unwrap_or_default()
        ),
        Err(why) => log::warn!("diagnostic text search failed: {why:?}"),
    }

    match embedder.embed_query(&question).await {
        Ok(embedding) => log::debug!(
            "embedding generated successfully. first 5 values: {:?}",
            &embedding[..embedding.len().min(5)]
        ),
        Err(why) => log::error!("error generating embedding: {why}"),
    }
}
