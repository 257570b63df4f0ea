use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use qdrant_client::{
    Qdrant,
    qdrant::{
        Condition, CreateFieldIndexCollectionBuilder, FieldType, Filter, PayloadSchemaType,
        PointId, ScrollPointsBuilder, SearchPointsBuilder, Value, VectorsOutput,
        point_id::PointIdOptions, value::Kind, vectors_output::VectorsOptions,
    },
};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::config::structure::StoreConfig;

use super::{connection::LazyConnection, retrieval::Passage};

/// A nearest-neighbour hit, still carrying the stored vector so it can be
/// re-ranked locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub passage: Passage,
    pub vector: Vec<f32>,
    pub score: f32,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Makes sure the full-text index on the text field exists.
    /// Returns `true` when it had to be created.
    async fn ensure_text_index(&self) -> anyhow::Result<bool>;

    /// Approximate nearest neighbours of `embedding`, most similar first.
    async fn nearest(&self, embedding: Vec<f32>, limit: u64) -> anyhow::Result<Vec<Candidate>>;

    /// Plain full-text match over the text field.
    async fn text_search(&self, query: &str, limit: u32) -> anyhow::Result<Vec<Passage>>;

    /// Releases the connection, if one was opened.
    async fn shutdown(&self) {}
}

/// Why a hit came back without a usable vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingVector {
    #[error("no vectors returned")]
    Absent,

    #[error("points carry named vectors {available:?} but store.embedding_key is empty")]
    Unnamed { available: Vec<String> },

    #[error("named vector '{name}' not found, points carry {available:?}")]
    NotFound { name: String, available: Vec<String> },
}

impl MissingVector {
    /// A configuration problem rather than an odd point.
    fn is_misconfiguration(&self) -> bool {
        !matches!(self, MissingVector::Absent)
    }
}

pub struct QdrantStore {
    settings: StoreConfig,
    client: LazyConnection<Qdrant>,
    vector_warned: AtomicBool,
}

impl QdrantStore {
    /// Nothing is contacted until the first query.
    pub fn new(settings: StoreConfig) -> Self {
        Self {
            settings,
            client: LazyConnection::new(),
            vector_warned: AtomicBool::new(false),
        }
    }

    /// Connects once and hands out the shared handle afterwards.
    async fn connection(&self) -> anyhow::Result<Arc<Qdrant>> {
        self.client
            .get_or_connect(|| async {
                let client = Qdrant::from_url(&self.settings.url)
                    .api_key(self.settings.api_key.clone())
                    .skip_compatibility_check()
                    .build()?;

                client.health_check().await?;
                log::info!("connected to qdrant at {}", self.settings.url);

                Ok(client)
            })
            .await
    }

    fn passage_from_payload(&self, id: Option<PointId>, payload: HashMap<String, Value>) -> Option<Passage> {
        let mut metadata = Map::new();
        let mut text = None;

        for (key, value) in payload {
            match key == self.settings.text_key {
                true => {
                    if let Some(Kind::StringValue(s)) = value.kind {
                        text = Some(s);
                    }
                }
                false => {
                    metadata.insert(key, payload_to_json(value));
                }
            }
        }

        if let Some(id) = id.and_then(|id| id.point_id_options) {
            let id = match id {
                PointIdOptions::Num(num) => JsonValue::from(num),
                PointIdOptions::Uuid(uuid) => JsonValue::from(uuid),
            };
            metadata.insert("_id".to_string(), id);
        }

        let text = text.filter(|text| !text.is_empty())?;

        Some(Passage { text, metadata })
    }

    #[allow(deprecated)]
    fn point_vector(&self, vectors: Option<VectorsOutput>) -> Result<Vec<f32>, MissingVector> {
        let options = vectors
            .and_then(|vectors| vectors.vectors_options)
            .ok_or(MissingVector::Absent)?;

        match options {
            VectorsOptions::Vector(vector) => Ok(vector.data),
            VectorsOptions::Vectors(mut named) => {
                let Some(name) = self.settings.vector_name() else {
                    let mut available: Vec<String> = named.vectors.into_keys().collect();
                    available.sort();
                    return Err(MissingVector::Unnamed { available });
                };

                match named.vectors.remove(name) {
                    Some(vector) => Ok(vector.data),
                    None => {
                        let mut available: Vec<String> = named.vectors.into_keys().collect();
                        available.sort();
                        Err(MissingVector::NotFound {
                            name: name.to_string(),
                            available,
                        })
                    }
                }
            }
        }
    }

    /// Misconfigured vector names drop every hit, so they are reported once at
    /// warn. Returns whether this call logged the warning.
    fn report_missing_vector(&self, index: usize, missing: &MissingVector) -> bool {
        if !missing.is_misconfiguration() {
            log::debug!("skipping hit #{index}: {missing}");
            return false;
        }

        if self.vector_warned.swap(true, Ordering::Relaxed) {
            log::debug!("skipping hit #{index}: {missing}");
            return false;
        }

        log::warn!(
            "vector search hits are unusable, every result will be empty: {missing} (collection {})",
            self.settings.collection_name()
        );
        true
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    async fn ensure_text_index(&self) -> anyhow::Result<bool> {
        let client = self.connection().await?;
        let collection_name = self.settings.collection_name();

        let info = client.collection_info(&collection_name).await?;

        let exists = info
            .result
            .and_then(|info| info.payload_schema.get(&self.settings.text_key).cloned())
            .is_some_and(|schema| schema.data_type == PayloadSchemaType::Text as i32);

        if exists {
            return Ok(false);
        }

        log::info!(
            "creating text index on '{}' in {}",
            self.settings.text_key,
            collection_name
        );

        client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &collection_name,
                &self.settings.text_key,
                FieldType::Text,
            ))
            .await?;

        Ok(true)
    }

    async fn nearest(&self, embedding: Vec<f32>, limit: u64) -> anyhow::Result<Vec<Candidate>> {
        let client = self.connection().await?;

        let mut request =
            SearchPointsBuilder::new(self.settings.collection_name(), embedding, limit)
                .with_payload(true)
                .with_vectors(true);

        if let Some(name) = self.settings.vector_name() {
            request = request.vector_name(name);
        }

        let search_result = client.search_points(request).await?;

        Ok(search_result
            .result
            .into_iter()
            .enumerate()
            .filter_map(|(i, point)| {
                let vector = match self.point_vector(point.vectors) {
                    Ok(vector) => vector,
                    Err(missing) => {
                        self.report_missing_vector(i, &missing);
                        return None;
                    }
                };

                let Some(passage) = self.passage_from_payload(point.id, point.payload) else {
                    log::debug!("skipping hit #{i}: no text");
                    return None;
                };

                Some(Candidate {
                    passage,
                    vector,
                    score: point.score,
                })
            })
            .collect())
    }

    async fn text_search(&self, query: &str, limit: u32) -> anyhow::Result<Vec<Passage>> {
        let client = self.connection().await?;

        let scroll_result = client
            .scroll(
                ScrollPointsBuilder::new(self.settings.collection_name())
                    .filter(Filter::must([Condition::matches_text(
                        self.settings.text_key.clone(),
                        query.to_string(),
                    )]))
                    .with_payload(true)
                    .limit(limit),
            )
            .await?;

        Ok(scroll_result
            .result
            .into_iter()
            .filter_map(|point| self.passage_from_payload(point.id, point.payload))
            .collect())
    }

    async fn shutdown(&self) {
        if self.client.close().await {
            log::info!("closed qdrant connection");
        }
    }
}

pub fn payload_to_json(value: Value) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(payload_to_json).collect())
        }
        Some(Kind::StructValue(object)) => JsonValue::Object(
            object
                .fields
                .into_iter()
                .map(|(key, value)| (key, payload_to_json(value)))
                .collect(),
        ),
    }
}
