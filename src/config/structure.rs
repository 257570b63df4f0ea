use serde::{Deserialize, Serialize};

use crate::chat::client::providers::Provider;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RagConfigTOML {
    #[serde(default)]
    pub config: RagConfigInner,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RagConfigInner {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            log_level: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LLMConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-pro".to_string(),
            base_url: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: None,
            model: "embedding-001".to_string(),
            base_url: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub database: String,
    pub collection: String,
    pub text_key: String,
    /// Named vector holding the document embeddings, empty for the unnamed one.
    pub embedding_key: String,
}

impl StoreConfig {
    /// Qdrant has a single namespace, so database and collection are joined.
    pub fn collection_name(&self) -> String {
        format!("{}_{}", self.database, self.collection)
    }

    pub fn vector_name(&self) -> Option<&str> {
        match self.embedding_key.is_empty() {
            true => None,
            false => Some(&self.embedding_key),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            database: "docs".to_string(),
            collection: "embeddings".to_string(),
            text_key: "text".to_string(),
            embedding_key: "embedding".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Where the chat handler reaches the vector search endpoint.
    pub endpoint: String,
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
    pub diagnostics: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/vectorSearch".to_string(),
            k: 4,
            fetch_k: 20,
            lambda: 0.1,
            diagnostics: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub with_context: String,
    pub without_context: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            with_context: crate::chat::prompt::WITH_CONTEXT_TEMPLATE.to_string(),
            without_context: crate::chat::prompt::WITHOUT_CONTEXT_TEMPLATE.to_string(),
        }
    }
}
