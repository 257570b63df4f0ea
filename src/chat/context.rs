use anyhow::bail;
use async_trait::async_trait;
use serde_json::json;

use crate::archive::retrieval::{Passage, SearchResponse};

pub mod message;

/// Where the chat pipeline gets its documentation context from.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn retrieve(&self, question: &str) -> anyhow::Result<Vec<Passage>>;
}

/// Calls the vector search endpoint over HTTP, exactly as an outside client
/// would. No timeout and no retry: a slow search holds up the chat reply.
pub struct RetrievalClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RetrievalClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ContextSource for RetrievalClient {
    async fn retrieve(&self, question: &str) -> anyhow::Result<Vec<Passage>> {
        log::debug!("sending request to {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "question": question }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("vector search returned {status}: {body}");
        }

        let SearchResponse { results } = response.json().await?;
        log::debug!("received {} passages from vector search", results.len());

        Ok(results)
    }
}
