use async_trait::async_trait;
use futures::stream::BoxStream;

use super::context::message::ChatMessage;

pub mod gemini;
pub mod providers;
mod sse;

/// Completion text in the order the model produced it.
pub type TokenStream = BoxStream<'static, anyhow::Result<String>>;

#[async_trait]
pub trait StreamingChatModel: Send + Sync {
    /// Starts a completion over the whole conversation. Returns once the
    /// model accepted the request; tokens arrive through the stream.
    async fn stream(&self, messages: Vec<ChatMessage>) -> anyhow::Result<TokenStream>;
}
