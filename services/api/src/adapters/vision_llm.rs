//! services/api/src/adapters/vision_llm.rs
//!
//! This module contains the adapter for the vision-capable LLM that reads the
//! tongue photo. It implements the `ImageAnalysisService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use diagnostic_core::{
    domain::{ImageData, Language},
    ports::{ImageAnalysisService, PortError, PortResult},
};

const VISION_INSTRUCTIONS: &str = "You are assisting a digestive-health questionnaire. Describe, in 3 to 5 short sentences, what the photo of the person's tongue shows that may relate to digestion: coating (color, thickness, distribution), tongue color, moisture, marks on the edges, cracks. Describe observations only, never diagnose diseases, never name medications. If the image is not a tongue or is unreadable, say so in one sentence.";

/// An adapter that implements `ImageAnalysisService` using an OpenAI vision model.
#[derive(Clone)]
pub struct OpenAiVisionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiVisionAdapter {
    /// Creates a new `OpenAiVisionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Builds the inline `data:` URL the vision endpoint accepts.
pub fn data_url(image: &ImageData) -> String {
    format!("data:{};base64,{}", image.mime_type, image.base64)
}

#[async_trait]
impl ImageAnalysisService for OpenAiVisionAdapter {
    async fn analyze_image(&self, image: &ImageData, language: Language) -> PortResult<String> {
        let reply_in = match language {
            Language::Es => "Responde en español.",
            Language::En => "Reply in English.",
        };

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(reply_in)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url(image))
                    .detail(ImageDetail::Low)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            )
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(VISION_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![text_part.into(), image_part.into()])
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(300u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Vision LLM response contained no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_mime_type() {
        let image = ImageData {
            base64: "AAAA".into(),
            mime_type: "image/png".into(),
        };
        assert_eq!(data_url(&image), "data:image/png;base64,AAAA");
    }
}
