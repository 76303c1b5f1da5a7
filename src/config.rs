//! Configuration types for medical image analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. The credential is an ordinary field: it is
//! handed to the capability constructor and never written back into the
//! process environment.

use crate::capability::AnalysisCapability;
use crate::error::MedImgError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Gemini model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Width every upload is resized to before transmission.
pub const DEFAULT_TARGET_WIDTH: u32 = 500;

/// Configuration for a medical image analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use medimg_report::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_key("AIza...")
///     .web_search(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_width, 500);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// API key for the analysis capability. Required for the Gemini backend.
    pub api_key: Option<String>,

    /// Provider name. `None` or `"gemini"` selects the direct Gemini backend;
    /// anything else (e.g. `"openai"`, `"anthropic"`, `"ollama"`) goes through
    /// `edgequake_llm::ProviderFactory`, which reads that provider's own key.
    pub provider_name: Option<String>,

    /// Model identifier. If None, uses [`DEFAULT_GEMINI_MODEL`] for Gemini
    /// and the provider default otherwise.
    pub model: Option<String>,

    /// Pre-constructed capability. Takes precedence over `provider_name`.
    pub capability: Option<Arc<dyn AnalysisCapability>>,

    /// Normalized image width in pixels. Range: 100–4096. Default: 500.
    pub target_width: u32,

    /// Let the capability run web searches for the research section. Default: true.
    ///
    /// Only the Gemini backend has a search tool; other providers ignore it.
    pub web_search: bool,

    /// Custom analysis prompt. If None, uses [`crate::prompts::build_prompt`].
    pub prompt: Option<String>,

    /// Sampling temperature. If None, the provider default applies.
    pub temperature: Option<f32>,

    /// Maximum output tokens. If None, the provider default applies.
    pub max_output_tokens: Option<usize>,

    /// Base URL of the Gemini REST API. Overridden in tests.
    pub api_base_url: String,

    /// Directory for transient upload/normalized files. Default: system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Optional progress observer (CLI spinner, logging, …).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider_name: None,
            model: None,
            capability: None,
            target_width: DEFAULT_TARGET_WIDTH,
            web_search: true,
            prompt: None,
            temperature: None,
            max_output_tokens: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temp_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field(
                "capability",
                &self.capability.as_ref().map(|_| "<dyn AnalysisCapability>"),
            )
            .field("target_width", &self.target_width)
            .field("web_search", &self.web_search)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_base_url", &self.api_base_url)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when the direct Gemini backend will be used.
    pub fn uses_gemini(&self) -> bool {
        self.capability.is_none()
            && self
                .provider_name
                .as_deref()
                .map_or(true, |p| p.eq_ignore_ascii_case("gemini"))
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn capability(mut self, capability: Arc<dyn AnalysisCapability>) -> Self {
        self.config.capability = Some(capability);
        self
    }

    pub fn target_width(mut self, width: u32) -> Self {
        self.config.target_width = width;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.config.web_search = enabled;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing API key is not rejected here; it only becomes fatal when the
    /// Gemini capability is constructed (see [`crate::capability::resolve_capability`]).
    pub fn build(self) -> Result<AnalysisConfig, MedImgError> {
        let c = &self.config;
        if !(100..=4096).contains(&c.target_width) {
            return Err(MedImgError::InvalidConfig(format!(
                "Target width must be 100–4096 px, got {}",
                c.target_width
            )));
        }
        if c.api_base_url.is_empty() {
            return Err(MedImgError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        if let Some(ref p) = c.prompt {
            if p.trim().is_empty() {
                return Err(MedImgError::InvalidConfig(
                    "Custom prompt must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.target_width, 500);
        assert!(c.web_search);
        assert!(c.api_key.is_none());
        assert!(c.uses_gemini());
        assert_eq!(c.api_base_url, DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn blank_api_key_is_treated_as_missing() {
        let c = AnalysisConfig::builder().api_key("   ").build().unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn target_width_out_of_range_rejected() {
        let err = AnalysisConfig::builder().target_width(10).build().unwrap_err();
        assert!(matches!(err, MedImgError::InvalidConfig(_)));
        assert!(AnalysisConfig::builder().target_width(5000).build().is_err());
        assert!(AnalysisConfig::builder().target_width(800).build().is_ok());
    }

    #[test]
    fn empty_prompt_rejected() {
        assert!(AnalysisConfig::builder().prompt("  ").build().is_err());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = AnalysisConfig::builder()
            .api_base_url("http://127.0.0.1:9000/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn other_provider_disables_gemini_path() {
        let c = AnalysisConfig::builder()
            .provider_name("openai")
            .build()
            .unwrap();
        assert!(!c.uses_gemini());
        let c = AnalysisConfig::builder()
            .provider_name("Gemini")
            .build()
            .unwrap();
        assert!(c.uses_gemini());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = AnalysisConfig::builder()
            .api_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
