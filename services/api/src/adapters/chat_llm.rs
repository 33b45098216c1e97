//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the conversational LLM.
//! It implements both `EmpathyCommentService` and `DiagnosisGenerationService`
//! from the `core` crate; the prompts themselves are built in `core::diagnosis`.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use diagnostic_core::{
    diagnosis::{build_comment_prompt, build_diagnosis_prompt, Prompt},
    domain::{AnsweredQuestion, CollectedInfo, Language},
    ports::{DiagnosisGenerationService, EmpathyCommentService, PortError, PortResult},
};

const COMMENT_MAX_TOKENS: u32 = 120;
const DIAGNOSIS_MAX_TOKENS: u32 = 1200;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that writes comments and diagnoses with an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends a system/user prompt pair and returns the text of the first choice.
    async fn complete(
        &self,
        prompt: Prompt,
        temperature: f32,
        max_tokens: u32,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .max_completion_tokens(max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(PortError::Unexpected(
                "Chat LLM response contained no text content.".to_string(),
            ));
        }
        Ok(content)
    }
}

//=========================================================================================
// Trait Implementations
//=========================================================================================

#[async_trait]
impl EmpathyCommentService for OpenAiChatAdapter {
    async fn generate_comment(
        &self,
        question: &str,
        answer: &str,
        language: Language,
    ) -> PortResult<String> {
        let prompt = build_comment_prompt(question, answer, language);
        self.complete(prompt, 0.8, COMMENT_MAX_TOKENS).await
    }
}

#[async_trait]
impl DiagnosisGenerationService for OpenAiChatAdapter {
    async fn generate_diagnosis(
        &self,
        user_name: Option<&str>,
        answers: &[AnsweredQuestion],
        image_analysis: Option<&str>,
        language: Language,
        info: Option<&CollectedInfo>,
    ) -> PortResult<String> {
        let prompt = build_diagnosis_prompt(user_name, answers, image_analysis, language, info);
        tracing::debug!(answers = answers.len(), "Requesting diagnosis from chat LLM");
        self.complete(prompt, 0.7, DIAGNOSIS_MAX_TOKENS).await
    }
}
