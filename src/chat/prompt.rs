use std::ops::Deref;

use crate::{archive::retrieval::Passage, config::structure::PromptConfig};

use template::TemplateVariables;

pub mod template;

pub const WITH_CONTEXT_TEMPLATE: &str = r#"You are a very enthusiastic freeCodeCamp.org representative who loves to help people! Given the following sections from the freeCodeCamp.org contributor documentation, answer the question using only that information, outputted in markdown format. If you are unsure and the answer is not explicitly written in the documentation, say "Sorry, I don't know how to help with that."

Context sections:
{context}

Question: """
{question}
""""#;

pub const WITHOUT_CONTEXT_TEMPLATE: &str = r#"You are a very enthusiastic freeCodeCamp.org representative who loves to help people! Please answer the following question to the best of your ability, outputted in markdown format:

Question: """
{question}
""""#;

/// The rendered text that replaces the content of the last message.
#[derive(Debug, Clone, PartialEq)]
pub enum UserPrompt {
    WithContext(String),
    WithoutContext(String),
}

impl UserPrompt {
    /// Picks the template by whether any passage text survived joining.
    pub fn build(config: &PromptConfig, passages: &[Passage], question: &str) -> Self {
        let context = Self::join_context(passages);

        match context.is_empty() {
            false => Self::WithContext(
                TemplateVariables::new(&context, question).substitute_template(&config.with_context),
            ),
            true => Self::WithoutContext(
                TemplateVariables::new("", question).substitute_template(&config.without_context),
            ),
        }
    }

    /// Passage texts separated by a blank line.
    pub fn join_context(passages: &[Passage]) -> String {
        passages
            .iter()
            .map(|passage| passage.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn has_context(&self) -> bool {
        matches!(self, Self::WithContext(_))
    }

    pub fn into_string(self) -> String {
        match self {
            Self::WithContext(s) | Self::WithoutContext(s) => s,
        }
    }
}

impl Deref for UserPrompt {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::WithContext(s) | Self::WithoutContext(s) => s,
        }
    }
}
