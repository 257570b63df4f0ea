use std::sync::Arc;

use futures::{StreamExt, stream::BoxStream};

use crate::config::structure::PromptConfig;

use super::{
    client::StreamingChatModel,
    context::{ContextSource, message::ChatMessage},
    prompt::UserPrompt,
};

/// How retrieval went for one chat request. Sent to the client as the
/// `x-retrieval-status` header so a context-free answer is never silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStatus {
    /// At least one passage made it into the prompt.
    Context,
    /// The search worked but found nothing.
    Empty,
    /// The search call failed.
    Unavailable,
}

impl RetrievalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStatus::Context => "context",
            RetrievalStatus::Empty => "empty",
            RetrievalStatus::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("At least one message is required")]
    EmptyConversation,
}

pub struct ChatReply {
    pub retrieval: RetrievalStatus,
    pub tokens: BoxStream<'static, String>,
}

pub struct ChatEngine {
    context: Arc<dyn ContextSource>,
    model: Arc<dyn StreamingChatModel>,
    prompt: PromptConfig,
}

impl ChatEngine {
    pub fn new(
        context: Arc<dyn ContextSource>,
        model: Arc<dyn StreamingChatModel>,
        prompt: PromptConfig,
    ) -> Self {
        Self {
            context,
            model,
            prompt,
        }
    }

    /// Retrieves context for the last message, rewrites it into the prompt
    /// template and starts streaming the completion.
    ///
    /// Only an empty conversation is an error. Retrieval failures fall back to
    /// the context-free template, and generation failures end the stream early;
    /// both are logged.
    pub async fn respond(&self, mut messages: Vec<ChatMessage>) -> Result<ChatReply, ChatError> {
        let last = messages.last_mut().ok_or(ChatError::EmptyConversation)?;
        let question = last.content.clone();

        let (passages, retrieval_failed) = match self.context.retrieve(&question).await {
            Ok(passages) => (passages, false),
            Err(why) => {
                log::warn!("retrieval unavailable, answering without context: {why:?}");
                (Vec::new(), true)
            }
        };

        let prompt = UserPrompt::build(&self.prompt, &passages, &question);
        let retrieval = match (retrieval_failed, prompt.has_context()) {
            (true, _) => RetrievalStatus::Unavailable,
            (false, true) => RetrievalStatus::Context,
            (false, false) => RetrievalStatus::Empty,
        };

        log::info!(
            "answering with {} passages ({})",
            passages.len(),
            retrieval.as_str()
        );
        log::debug!("final prompt:\n{}", &*prompt);

        last.content = prompt.into_string();

        let tokens = match self.model.stream(messages).await {
            Ok(tokens) => tokens
                .scan((), |_, token| async move {
                    match token {
                        Ok(token) => Some(token),
                        Err(why) => {
                            log::error!("completion stream failed: {why:?}");
                            None
                        }
                    }
                })
                .boxed(),
            Err(why) => {
                log::error!("could not start completion: {why:?}");
                futures::stream::empty().boxed()
            }
        };

        Ok(ChatReply { retrieval, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chat::context::message::MessageRole,
        testing::{FakeContext, RecordingChat},
    };

    fn engine(context: FakeContext, model: Arc<RecordingChat>) -> ChatEngine {
        ChatEngine::new(Arc::new(context), model, PromptConfig::default())
    }

    async fn collect(reply: ChatReply) -> String {
        reply.tokens.collect::<Vec<_>>().await.concat()
    }

    #[tokio::test]
    async fn retrieved_context_lands_in_the_last_message_only() {
        let context = FakeContext::passages(["freeCodeCamp is licensed under BSD-3-Clause."]);
        let model = Arc::new(RecordingChat::answering(["It's ", "BSD-3-Clause."]));
        let engine = engine(context.clone(), model.clone());

        let reply = engine
            .respond(vec![
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello! How can I help?"),
                ChatMessage::user("What license does freeCodeCamp use?"),
            ])
            .await
            .unwrap();

        assert_eq!(reply.retrieval, RetrievalStatus::Context);
        assert_eq!(collect(reply).await, "It's BSD-3-Clause.");

        assert_eq!(context.questions(), vec!["What license does freeCodeCamp use?"]);

        let sent = model.last_request();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], ChatMessage::user("Hi"));
        assert_eq!(sent[1], ChatMessage::assistant("Hello! How can I help?"));
        assert_eq!(sent[2].role, MessageRole::User);
        assert!(sent[2].content.contains("Context sections:\nfreeCodeCamp is licensed under BSD-3-Clause."));
        assert!(sent[2].content.contains("Question: \"\"\"\nWhat license does freeCodeCamp use?\n\"\"\""));
    }

    #[tokio::test]
    async fn no_passages_falls_back_to_plain_prompt() {
        let model = Arc::new(RecordingChat::answering(["Sorry, I don't know how to help with that."]));
        let engine = engine(FakeContext::empty(), model.clone());

        let reply = engine
            .respond(vec![ChatMessage::user("How do I set up freeCodeCamp locally?")])
            .await
            .unwrap();

        assert_eq!(reply.retrieval, RetrievalStatus::Empty);
        assert!(!collect(reply).await.is_empty());
        assert!(!model.last_request()[0].content.contains("Context sections:"));
    }

    #[tokio::test]
    async fn retrieval_failure_is_reported_not_raised() {
        let model = Arc::new(RecordingChat::answering(["ok"]));
        let engine = engine(FakeContext::failing(), model.clone());

        let reply = engine.respond(vec![ChatMessage::user("anything")]).await.unwrap();

        assert_eq!(reply.retrieval, RetrievalStatus::Unavailable);
        assert_eq!(collect(reply).await, "ok");
        assert!(!model.last_request()[0].content.contains("Context sections:"));
    }

    #[tokio::test]
    async fn empty_conversation_is_rejected() {
        let engine = engine(FakeContext::failing(), Arc::new(RecordingChat::answering(["x"])));

        assert!(matches!(
            engine.respond(vec![]).await,
            Err(ChatError::EmptyConversation)
        ));
    }

    #[tokio::test]
    async fn model_that_never_starts_yields_an_empty_stream() {
        let engine = engine(
            FakeContext::passages(["a"]),
            Arc::new(RecordingChat::refusing()),
        );

        let reply = engine.respond(vec![ChatMessage::user("q")]).await.unwrap();
        assert_eq!(reply.retrieval, RetrievalStatus::Context);
        assert_eq!(collect(reply).await, "");
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_what_was_generated() {
        let engine = engine(
            FakeContext::passages(["a"]),
            Arc::new(RecordingChat::breaking_after(["par", "tial"])),
        );

        let reply = engine.respond(vec![ChatMessage::user("q")]).await.unwrap();
        assert_eq!(collect(reply).await, "partial");
    }
}
