//! Report requester: normalized image + fixed prompt → [`AnalysisOutcome`].
//!
//! This stage never propagates a capability failure. Network errors, quota
//! exhaustion and malformed responses are logged and turned into
//! [`AnalysisOutcome::Error`], so the caller always gets something to show
//! and the user can retry. There is no retry loop and no timeout beyond the
//! HTTP client's own.

use crate::capability::{resolve_capability, AnalysisCapability, CapabilityRequest};
use crate::config::AnalysisConfig;
use crate::error::MedImgError;
use crate::output::{AnalysisOutcome, AnalysisReport, ReportStats};
use crate::pipeline::encode::encode_normalized;
use crate::pipeline::normalize::NormalizedImage;
use crate::prompts::build_prompt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Packages a normalized image with the analysis prompt and calls the capability.
#[derive(Clone)]
pub struct ReportRequester {
    capability: Arc<dyn AnalysisCapability>,
    prompt: String,
    web_search: bool,
    temperature: Option<f32>,
    max_output_tokens: Option<usize>,
}

impl ReportRequester {
    /// Wrap an already-constructed capability.
    ///
    /// Web search is requested only if the config allows it *and* the
    /// capability can do it; the default prompt's research section follows
    /// the same decision.
    pub fn new(capability: Arc<dyn AnalysisCapability>, config: &AnalysisConfig) -> Self {
        let web_search = config.web_search && capability.supports_web_search();
        let prompt = config
            .prompt
            .clone()
            .unwrap_or_else(|| build_prompt(web_search));
        Self {
            capability,
            prompt,
            web_search,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// Resolve the capability from `config` (fails on a missing credential).
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, MedImgError> {
        let capability = resolve_capability(config)?;
        Ok(Self::new(capability, config))
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn capability(&self) -> &Arc<dyn AnalysisCapability> {
        &self.capability
    }

    /// Ask the capability for a report on `image`.
    ///
    /// Always returns an outcome; the only `Err`-like path is
    /// [`AnalysisOutcome::Error`].
    pub async fn request(&self, image: &NormalizedImage) -> AnalysisOutcome {
        let image_data = match encode_normalized(image).await {
            Ok(d) => d,
            Err(e) => {
                warn!("Could not read normalized image: {}", e);
                return AnalysisOutcome::failed(e.to_string());
            }
        };

        let request = CapabilityRequest {
            prompt: self.prompt.clone(),
            image: image_data,
            web_search: self.web_search,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        info!(
            "Requesting report from {} ({}, web_search={})",
            self.capability.name(),
            self.capability.model(),
            self.web_search
        );
        let start = Instant::now();

        match self.capability.analyze(&request).await {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {} sources, {:?}",
                    self.capability.name(),
                    response.input_tokens,
                    response.output_tokens,
                    response.sources.len(),
                    duration
                );
                AnalysisOutcome::Report(AnalysisReport {
                    markdown: response.text,
                    sources: response.sources,
                    stats: ReportStats {
                        model: self.capability.model().to_string(),
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        duration_ms: duration.as_millis() as u64,
                        source_width: image.source_width,
                        source_height: image.source_height,
                        normalized_width: image.width,
                        normalized_height: image.height,
                    },
                })
            }
            Err(e) => {
                warn!(
                    "{} failed after {:?}: {}",
                    self.capability.name(),
                    start.elapsed(),
                    e
                );
                AnalysisOutcome::failed(e.to_string())
            }
        }
    }
}
