use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderName, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;

use crate::{
    archive::retrieval::SearchResponse,
    chat::{
        context::message::ChatMessage,
        engine::{ChatError, ChatReply},
    },
};

use super::{error::SearchError, query::RetrievalQuery, state::AppState};

pub const RETRIEVAL_STATUS: HeaderName = HeaderName::from_static("x-retrieval-status");

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// `POST /api/vectorSearch`
pub async fn vector_search(
    State(state): State<Arc<AppState>>,
    RetrievalQuery { question }: RetrievalQuery,
) -> Result<Json<SearchResponse>, SearchError> {
    log::info!("vector search for {question:?}");

    let engine = state.retrieval.clone();
    let results = tokio::spawn(async move { engine.search(&question).await })
        .await
        .map_err(|why| {
            log::error!("search task failed: {why}");
            SearchError::Unknown
        })?
        .map_err(SearchError::Upstream)?;

    Ok(Json(SearchResponse { results }))
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ChatError> {
    log::info!("chat request with {} messages", request.messages.len());

    let ChatReply { retrieval, tokens } = state.chat.respond(request.messages).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (RETRIEVAL_STATUS, retrieval.as_str()),
        ],
        Body::from_stream(tokens.map(Ok::<_, Infallible>)),
    )
        .into_response())
}
