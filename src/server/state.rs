use std::sync::Arc;

use crate::{archive::retrieval::RetrievalEngine, chat::engine::ChatEngine};

/// Shared by every handler.
pub struct AppState {
    pub retrieval: Arc<RetrievalEngine>,
    pub chat: ChatEngine,
}

impl AppState {
    pub fn new(retrieval: Arc<RetrievalEngine>, chat: ChatEngine) -> Arc<Self> {
        Arc::new(Self { retrieval, chat })
    }
}
