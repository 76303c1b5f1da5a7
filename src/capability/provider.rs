//! `edgequake_llm` backend for non-Gemini providers.
//!
//! The prompt and image go in a single user message; none of these providers
//! is given a search tool, so `supports_web_search` stays false and the
//! prompt's research section asks for literature from the model's own
//! knowledge instead.

use super::{AnalysisCapability, CapabilityRequest, CapabilityResponse};
use crate::error::CapabilityError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::debug;

/// Adapter from an `edgequake_llm` provider to [`AnalysisCapability`].
pub struct LlmCapability {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
}

impl LlmCapability {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Build `CompletionOptions` from the request; unset fields keep provider defaults.
fn build_options(request: &CapabilityRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: request.temperature,
        max_tokens: request.max_output_tokens,
        ..Default::default()
    }
}

#[async_trait]
impl AnalysisCapability for LlmCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(
        &self,
        request: &CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![request.image.clone()],
        )];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CapabilityError::Provider(format!("{}: {}", self.name, e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse {
                provider: self.name.clone(),
            });
        }

        Ok(CapabilityResponse {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            sources: Vec::new(),
        })
    }
}
