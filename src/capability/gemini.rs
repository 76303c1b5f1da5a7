//! Gemini `generateContent` backend.
//!
//! One POST per analysis: the prompt and the base64 PNG go in a single user
//! turn. With web search enabled the `google_search` tool is attached and the
//! model decides on its own whether to query; any pages it cites come back in
//! `groundingMetadata` and are surfaced as [`WebSource`]s.
//!
//! The API key travels in the `x-goog-api-key` header so it never appears in
//! request URLs or access logs.

use super::{AnalysisCapability, CapabilityRequest, CapabilityResponse};
use crate::config::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::error::{CapabilityError, MedImgError};
use crate::output::WebSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const PROVIDER: &str = "gemini";

/// Gemini over REST with an explicitly injected API key.
#[derive(Clone)]
pub struct GeminiCapability {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GeminiCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiCapability")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiCapability {
    /// Create a client for the default model and public endpoint.
    ///
    /// A blank key is rejected here, so a misconfigured process fails at
    /// startup rather than on the first upload.
    pub fn new(api_key: impl Into<String>) -> Result<Self, MedImgError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MedImgError::MissingCredential {
                provider: PROVIDER.into(),
            });
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MedImgError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl AnalysisCapability for GeminiCapability {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_web_search(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        request: &CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        let body = build_request(request);
        debug!(
            "POST {} (web_search={}, image {} bytes base64)",
            self.endpoint(),
            request.web_search,
            request.image.data.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Transport {
                provider: PROVIDER.into(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CapabilityError::Transport {
                provider: PROVIDER.into(),
                detail: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(CapabilityError::Http {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| CapabilityError::MalformedResponse {
                provider: PROVIDER.into(),
                detail: e.to_string(),
            })?;
        parse_response(parsed)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: Blob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn build_request(request: &CapabilityRequest) -> GenerateContentRequest<'_> {
    let parts = vec![
        Part::Text {
            text: &request.prompt,
        },
        Part::InlineData {
            inline_data: Blob {
                mime_type: &request.image.mime_type,
                data: &request.image.data,
            },
        },
    ];

    let tools = request.web_search.then(|| {
        vec![Tool {
            google_search: EmptyObject {},
        }]
    });

    let generation_config = (request.temperature.is_some() || request.max_output_tokens.is_some())
        .then(|| GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        });

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        tools,
        generation_config,
    }
}

/// Pull the human-readable message out of a Gemini error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.chars().count() > 200 {
                format!("{}…", trimmed.chars().take(200).collect::<String>())
            } else if trimmed.is_empty() {
                "empty error body".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

fn parse_response(resp: GenerateContentResponse) -> Result<CapabilityResponse, CapabilityError> {
    let usage = resp.usage_metadata.unwrap_or_default();

    let Some(candidate) = resp.candidates.into_iter().next() else {
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(CapabilityError::Blocked {
                provider: PROVIDER.into(),
                reason,
            });
        }
        return Err(CapabilityError::MalformedResponse {
            provider: PROVIDER.into(),
            detail: "response contained no candidates".into(),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                CapabilityError::Blocked {
                    provider: PROVIDER.into(),
                    reason: reason.to_string(),
                }
            }
            _ => CapabilityError::EmptyResponse {
                provider: PROVIDER.into(),
            },
        });
    }

    let mut sources: Vec<WebSource> = Vec::new();
    if let Some(meta) = candidate.grounding_metadata {
        for chunk in meta.grounding_chunks {
            let Some(web) = chunk.web else { continue };
            let Some(uri) = web.uri else { continue };
            if sources.iter().any(|s| s.uri == uri) {
                continue;
            }
            let title = web.title.unwrap_or_else(|| uri.clone());
            sources.push(WebSource { title, uri });
        }
    }

    Ok(CapabilityResponse {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        sources,
    })
}
