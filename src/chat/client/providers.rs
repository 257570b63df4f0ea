use std::fmt::Display;

use async_trait::async_trait;

use rig::{
    embeddings::{EmbeddingError, EmbeddingModel},
    providers::{gemini, openai},
};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub enum ProviderClient {
    Gemini(gemini::Client),
    OpenAI(openai::Client),
}

#[async_trait]
pub trait DynEmbeddingModel: Send + Sync {
    /// Embeds a single query, narrowed to the `f32` the vector store speaks.
    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
impl<T> DynEmbeddingModel for T
where
    T: EmbeddingModel + Send + Sync,
{
    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = EmbeddingModel::embed_text(self, input).await?;

        Ok(embedding.vec.into_iter().map(|x| x as f32).collect())
    }
}

impl ProviderClient {
    /// Returns an embedding model wrapper for the given provider and model name.
    pub fn embedding_model(&self, model: &str) -> Box<dyn DynEmbeddingModel> {
        match self {
            ProviderClient::Gemini(client) => Box::new(client.embedding_model(model)),
            ProviderClient::OpenAI(client) => Box::new(client.embedding_model(model)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    #[serde(rename = "gemini")]
    #[serde(alias = "google")]
    Gemini,

    #[serde(rename = "openai")]
    #[serde(alias = "openai-api")]
    #[serde(alias = "openai-compatible")]
    OpenAI,
}

impl TryFrom<String> for Provider {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        serde_plain::from_str(&value).map_err(|e| anyhow::anyhow!("{}", e))
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        serde_plain::to_string(self)
            .map_err(|_| std::fmt::Error)?
            .fmt(f)
    }
}

impl Provider {
    pub fn client(&self, api_key: &str, custom_url: Option<&str>) -> ProviderClient {
        match self {
            Provider::Gemini => match custom_url {
                None => ProviderClient::Gemini(gemini::Client::new(api_key)),
                Some(url) => ProviderClient::Gemini(gemini::Client::from_url(api_key, url)),
            },
            Provider::OpenAI => match custom_url {
                None => ProviderClient::OpenAI(openai::Client::new(api_key)),
                Some(url) => ProviderClient::OpenAI(openai::Client::from_url(api_key, url)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip_through_plain_strings() {
        assert_eq!(Provider::try_from("gemini".to_string()).unwrap(), Provider::Gemini);
        assert_eq!(Provider::try_from("google".to_string()).unwrap(), Provider::Gemini);
        assert_eq!(
            Provider::try_from("openai-compatible".to_string()).unwrap(),
            Provider::OpenAI
        );
        assert!(Provider::try_from("anthropic".to_string()).is_err());

        assert_eq!(Provider::OpenAI.to_string(), "openai");
        assert_eq!(Provider::default(), Provider::Gemini);
    }
}
