//! In-process stand-ins for the external services.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::bail;
use async_trait::async_trait;
use futures::{
    StreamExt,
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
};
use rig::embeddings::EmbeddingError;
use serde_json::Map;

use crate::{
    archive::{
        mmr::{cosine_similarity, magnitude},
        retrieval::Passage,
        storage::{Candidate, DocumentStore},
    },
    chat::{
        client::{StreamingChatModel, TokenStream, providers::DynEmbeddingModel},
        context::{ContextSource, message::ChatMessage},
    },
};

/// Letter frequencies: crude, but deterministic and similarity-preserving
/// enough for ranking tests.
pub fn letter_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 26];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    vector
}

#[derive(Default)]
pub struct FakeEmbedder {
    fail: bool,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl DynEmbeddingModel for FakeEmbedder {
    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.fail {
            true => Err(EmbeddingError::ProviderError("embedding quota exceeded".to_string())),
            false => Ok(letter_embedding(input)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Index,
    Nearest,
    TextSearch,
    Panic,
}

#[derive(Default)]
pub struct FakeStore {
    docs: Vec<(Passage, Vec<f32>)>,
    failure: Option<Failure>,
    pub index_checks: AtomicUsize,
    pub text_searches: AtomicUsize,
}

impl FakeStore {
    pub fn with_docs<I>(texts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let docs = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let text = text.into();
                let mut metadata = Map::new();
                metadata.insert("_id".to_string(), i.into());
                let vector = letter_embedding(&text);
                (Passage { text, metadata }, vector)
            })
            .collect();

        Self {
            docs,
            ..Default::default()
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn ensure_text_index(&self) -> anyhow::Result<bool> {
        let previous = self.index_checks.fetch_add(1, Ordering::SeqCst);
        if self.failure == Some(Failure::Index) {
            bail!("not authorized to create indexes");
        }
        Ok(previous == 0)
    }

    async fn nearest(&self, embedding: Vec<f32>, limit: u64) -> anyhow::Result<Vec<Candidate>> {
        match self.failure {
            Some(Failure::Nearest) => bail!("vector search unavailable"),
            Some(Failure::Panic) => panic!("driver bug"),
            _ => {}
        }

        let query_mag = magnitude(&embedding);
        let mut hits: Vec<Candidate> = self
            .docs
            .iter()
            .map(|(passage, vector)| Candidate {
                passage: passage.clone(),
                vector: vector.clone(),
                score: cosine_similarity(&embedding, vector, query_mag, magnitude(vector)),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit as usize);

        Ok(hits)
    }

    async fn text_search(&self, query: &str, limit: u32) -> anyhow::Result<Vec<Passage>> {
        self.text_searches.fetch_add(1, Ordering::SeqCst);
        if self.failure == Some(Failure::TextSearch) {
            bail!("text index missing");
        }

        let query = query.to_lowercase();
        Ok(self
            .docs
            .iter()
            .filter(|(passage, _)| passage.text.to_lowercase().contains(&query))
            .take(limit as usize)
            .map(|(passage, _)| passage.clone())
            .collect())
    }
}

/// Answers every question with the same passages and remembers what it was
/// asked.
#[derive(Clone, Default)]
pub struct FakeContext {
    passages: Option<Vec<Passage>>,
    questions: Arc<Mutex<Vec<String>>>,
}

impl FakeContext {
    pub fn passages<I>(texts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            passages: Some(
                texts
                    .into_iter()
                    .map(|text| Passage {
                        text: text.into(),
                        metadata: Map::new(),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self {
            passages: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextSource for FakeContext {
    async fn retrieve(&self, question: &str) -> anyhow::Result<Vec<Passage>> {
        self.questions.lock().unwrap().push(question.to_string());

        match &self.passages {
            Some(passages) => Ok(passages.clone()),
            None => bail!("connection refused"),
        }
    }
}

enum Script {
    Answer(Vec<String>),
    Refuse,
    BreakAfter(Vec<String>),
}

/// A chat model that replays a script and keeps the last conversation it
/// was sent.
pub struct RecordingChat {
    script: Script,
    last_request: Mutex<Option<Vec<ChatMessage>>>,
}

impl RecordingChat {
    fn new(script: Script) -> Self {
        Self {
            script,
            last_request: Mutex::new(None),
        }
    }

    pub fn answering<const N: usize>(tokens: [&str; N]) -> Self {
        Self::new(Script::Answer(tokens.map(String::from).to_vec()))
    }

    pub fn refusing() -> Self {
        Self::new(Script::Refuse)
    }

    pub fn breaking_after<const N: usize>(tokens: [&str; N]) -> Self {
        Self::new(Script::BreakAfter(tokens.map(String::from).to_vec()))
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("model was never called")
    }
}

#[async_trait]
impl StreamingChatModel for RecordingChat {
    async fn stream(&self, messages: Vec<ChatMessage>) -> anyhow::Result<TokenStream> {
        *self.last_request.lock().unwrap() = Some(messages);

        match &self.script {
            Script::Refuse => bail!("API key not valid"),
            Script::Answer(tokens) => {
                Ok(futures::stream::iter(tokens.clone().into_iter().map(Ok)).boxed())
            }
            Script::BreakAfter(tokens) => {
                let items = tokens
                    .clone()
                    .into_iter()
                    .map(Ok)
                    .chain([Err(anyhow::anyhow!("connection reset")), Ok("lost".to_string())]);
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }
}

/// A chat model whose tokens are pushed by the test, one at a time.
pub struct ChannelChat {
    tokens: Mutex<Option<UnboundedReceiver<anyhow::Result<String>>>>,
}

impl ChannelChat {
    pub fn new() -> (Self, UnboundedSender<anyhow::Result<String>>) {
        let (sender, receiver) = unbounded();
        let chat = Self {
            tokens: Mutex::new(Some(receiver)),
        };
        (chat, sender)
    }
}

#[async_trait]
impl StreamingChatModel for ChannelChat {
    async fn stream(&self, _messages: Vec<ChatMessage>) -> anyhow::Result<TokenStream> {
        match self.tokens.lock().unwrap().take() {
            Some(tokens) => Ok(tokens.boxed()),
            None => bail!("channel chat can only stream once"),
        }
    }
}
