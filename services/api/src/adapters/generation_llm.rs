//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the content-generating LLM.
//! It implements the `ContentGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use prep_core::{
    content::{self, ContentError},
    domain::{FlashcardDraft, Question},
    ports::{ContentGenerationService, PortError, PortResult},
};
use tracing::{info, warn};

const SYSTEM_INSTRUCTIONS: &str = "You are an expert UPSC Civil Services examiner. You answer with JSON only: no prose, no markdown.";

const QUESTIONS_TEMPLATE: &str = "Generate {count} UPSC Prelims MCQ questions in the multi-statement format. Each question should start with 'Consider the following statements:' and list 2–4 statements as an array. The options should be in the format: (a) 1 only, (b) 1 and 2, (c) 2 and 3, (d) 1, 2 and 3. Provide the correct answer and a detailed explanation, and name the topic from the list below that the question covers. Format as JSON: [{question, statements: [..], options: [..], answer, explanation, topic}]. Cover the following topics: {topics}.";

const FLASHCARDS_TEMPLATE: &str = "Generate {count} flash cards for UPSC preparation on the topic: '{topic}'. Each card should have a question and a concise answer/explanation. Format as JSON: [{question, answer}].";

const TOPICS_TEMPLATE: &str = "List the most important and relevant topics for UPSC preparation under the subject '{subject}'. Format as a JSON array of strings.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiContentAdapter {
    /// Creates a new `OpenAiContentAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends one prompt and returns the text of the first choice.
    async fn complete(&self, prompt: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTIONS)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::ExternalService(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::ExternalService(
                    "Generation LLM response contained no text content.".to_string(),
                )
            })
    }
}

/// Generated text that fails validation never leaves the adapter untyped.
fn unusable(kind: &str, e: ContentError) -> PortError {
    warn!("Discarding generated {}: {}", kind, e);
    PortError::from(e)
}

pub(crate) fn questions_prompt(topics: &[String], count: usize) -> String {
    QUESTIONS_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{topics}", &topics.join(", "))
}

//=========================================================================================
// `ContentGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerationService for OpenAiContentAdapter {
    async fn generate_questions(&self, topics: &[String], count: usize) -> PortResult<Vec<Question>> {
        if topics.is_empty() {
            return Err(PortError::InvalidInput("At least one topic is required.".to_string()));
        }
        info!("Generating {} questions on {:?}", count, topics);
        let text = self.complete(questions_prompt(topics, count)).await?;
        content::parse_questions(&text).map_err(|e| unusable("questions", e))
    }

    async fn generate_flashcards(&self, topic: &str, count: usize) -> PortResult<Vec<FlashcardDraft>> {
        info!("Generating {} flashcards on '{}'", count, topic);
        let prompt = FLASHCARDS_TEMPLATE
            .replace("{count}", &count.to_string())
            .replace("{topic}", topic);
        let text = self.complete(prompt).await?;
        content::parse_flashcards(&text).map_err(|e| unusable("flash cards", e))
    }

    async fn generate_topics(&self, subject: &str) -> PortResult<Vec<String>> {
        info!("Generating topics for '{}'", subject);
        let prompt = TOPICS_TEMPLATE.replace("{subject}", subject);
        let text = self.complete(prompt).await?;
        content::parse_topics(&text).map_err(|e| unusable("topics", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_prompt_lists_every_topic() {
        let prompt = questions_prompt(&["Polity".to_string(), "Economy".to_string()], 5);
        assert!(prompt.starts_with("Generate 5 UPSC Prelims MCQ questions"));
        assert!(prompt.ends_with("Cover the following topics: Polity, Economy."));
    }
}
