//! The external analysis capability: a multimodal model behind a trait.
//!
//! The requester only knows [`AnalysisCapability`]. Two backends implement it:
//!
//! * [`gemini::GeminiCapability`] — Gemini `generateContent` over REST, with the
//!   credential passed to its constructor and optional `google_search`
//!   grounding for the research section.
//! * [`provider::LlmCapability`] — any `edgequake_llm` provider (OpenAI,
//!   Anthropic, Ollama, …); no web search.
//!
//! Tests substitute their own implementation to script successes and failures.

pub mod gemini;
pub mod provider;

use crate::config::AnalysisConfig;
use crate::error::{CapabilityError, MedImgError};
use crate::output::WebSource;
use async_trait::async_trait;
use edgequake_llm::{ImageData, ProviderFactory};
use std::sync::Arc;
use tracing::info;

pub use gemini::GeminiCapability;
pub use provider::LlmCapability;

/// Everything a capability needs for one analysis.
#[derive(Clone)]
pub struct CapabilityRequest {
    pub prompt: String,
    pub image: ImageData,
    /// Allow supplementary web lookups (honoured only by backends that can).
    pub web_search: bool,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<usize>,
}

/// The capability's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub sources: Vec<WebSource>,
}

/// An opaque, network-accessed multimodal model.
#[async_trait]
pub trait AnalysisCapability: Send + Sync {
    /// Provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Model identifier reported in [`crate::output::ReportStats`].
    fn model(&self) -> &str;

    /// Whether this backend can run web searches on its own.
    fn supports_web_search(&self) -> bool {
        false
    }

    /// Send the prompt and image; return the model's text.
    async fn analyze(
        &self,
        request: &CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError>;
}

/// Default model per `edgequake_llm` provider when none is configured.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" | "lmstudio" => "llava",
        "mistral" => "pixtral-12b-2409",
        _ => "gpt-4.1-nano",
    }
}

/// Resolve the capability, from most-specific to least-specific.
///
/// 1. **Pre-built capability** (`config.capability`), used as-is.
/// 2. **Gemini** (no provider name, or `"gemini"`) requires `config.api_key`;
///    a missing key is [`MedImgError::MissingCredential`].
/// 3. **Named provider**, built through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    own API key variable.
pub fn resolve_capability(
    config: &AnalysisConfig,
) -> Result<Arc<dyn AnalysisCapability>, MedImgError> {
    if let Some(ref capability) = config.capability {
        return Ok(Arc::clone(capability));
    }

    if config.uses_gemini() {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| MedImgError::MissingCredential {
                provider: "gemini".into(),
            })?;
        let mut gemini = GeminiCapability::new(api_key)?.with_base_url(&config.api_base_url);
        if let Some(ref model) = config.model {
            gemini = gemini.with_model(model);
        }
        info!("Using Gemini capability (model {})", gemini.model());
        return Ok(Arc::new(gemini));
    }

    let name = config.provider_name.as_deref().unwrap_or("openai");
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| default_model_for(name).to_string());
    let provider = ProviderFactory::create_llm_provider(name, &model).map_err(|e| {
        MedImgError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using {} capability (model {})", name, model);
    Ok(Arc::new(LlmCapability::new(provider, name, model)))
}
