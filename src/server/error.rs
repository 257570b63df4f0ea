//! Boundary errors and their HTTP rendering.
//!
//! Internal failures are logged in full before answering. Upstream messages
//! are passed through in `details`, matching what clients of the search
//! endpoint already expect.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::chat::engine::ChatError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Question is required")]
    MissingQuestion,

    /// Embedding, connection or query failure.
    #[error("An error occurred during the search")]
    Upstream(#[source] anyhow::Error),

    /// The search task died without producing an error value.
    #[error("An unknown error occurred during the search")]
    Unknown,
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            SearchError::MissingQuestion => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            SearchError::Upstream(why) => {
                log::error!("error during vector search: {why:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string(), "details": why.to_string() }),
                )
            }
            SearchError::Unknown => {
                log::error!("vector search ended without a result");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        match self {
            ChatError::EmptyConversation => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}
