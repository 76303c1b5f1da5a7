//! Result types produced by an analysis.
//!
//! [`AnalysisOutcome`] is the tagged success/failure value the requester
//! hands back. Capability failures are a normal outcome, not an `Err`, so the
//! shell can pattern-match and render either case in the same panel.

use crate::error::MedImgError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shown before every capability failure message.
pub const ANALYSIS_ERROR_PREFIX: &str = "⚠️ Analysis error:";

/// A web page the capability consulted while writing the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    pub title: String,
    pub uri: String,
}

/// Timing, token and image-size statistics for one report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    /// Model that produced the report.
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock time spent waiting on the capability.
    pub duration_ms: u64,
    pub source_width: u32,
    pub source_height: u32,
    pub normalized_width: u32,
    pub normalized_height: u32,
}

/// The markdown report returned by the capability, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<WebSource>,
    pub stats: ReportStats,
}

/// A capability failure, converted to a message for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub message: String,
}

impl fmt::Display for AnalysisFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", ANALYSIS_ERROR_PREFIX, self.message)
    }
}

/// How an outcome is written to a file or stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The displayed text: report markdown or the prefixed error.
    #[default]
    Markdown,
    /// The tagged outcome as pretty-printed JSON.
    Json,
}

/// Result of asking the capability for a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Report(AnalysisReport),
    Error(AnalysisFailure),
}

impl AnalysisOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        AnalysisOutcome::Error(AnalysisFailure {
            message: message.into(),
        })
    }

    pub fn is_report(&self) -> bool {
        matches!(self, AnalysisOutcome::Report(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Report(r) => Some(r),
            AnalysisOutcome::Error(_) => None,
        }
    }

    /// Text shown to the user: the report markdown, or the prefixed error.
    pub fn display_text(&self) -> String {
        match self {
            AnalysisOutcome::Report(r) => r.markdown.clone(),
            AnalysisOutcome::Error(e) => e.to_string(),
        }
    }

    /// Render in `format`, always ending with a newline.
    pub fn render(&self, format: OutputFormat) -> Result<String, MedImgError> {
        let mut text = match format {
            OutputFormat::Markdown => self.display_text(),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| MedImgError::Internal(format!("failed to serialise outcome: {e}")))?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            markdown: "### 1. Image Type & Region\nChest X-ray".into(),
            sources: vec![],
            stats: ReportStats {
                model: "gemini-2.0-flash-exp".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn failure_display_is_prefixed() {
        let o = AnalysisOutcome::failed("quota exceeded");
        assert!(!o.is_report());
        assert_eq!(o.display_text(), "⚠️ Analysis error: quota exceeded");
    }

    #[test]
    fn report_display_is_verbatim() {
        let o = AnalysisOutcome::Report(sample_report());
        assert!(o.is_report());
        assert_eq!(o.display_text(), "### 1. Image Type & Region\nChest X-ray");
        assert!(!o.display_text().starts_with(ANALYSIS_ERROR_PREFIX));
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let json = serde_json::to_value(AnalysisOutcome::failed("boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(AnalysisOutcome::Report(sample_report())).unwrap();
        assert_eq!(json["status"], "report");
        assert_eq!(json["stats"]["model"], "gemini-2.0-flash-exp");
        assert!(json.get("sources").is_none());
    }

    #[test]
    fn render_json_is_tagged_and_newline_terminated() {
        let text = AnalysisOutcome::Report(sample_report())
            .render(OutputFormat::Json)
            .unwrap();
        assert!(text.ends_with("}\n"));
        let back: AnalysisOutcome = serde_json::from_str(&text).unwrap();
        assert_eq!(back, AnalysisOutcome::Report(sample_report()));

        let text = AnalysisOutcome::failed("boom").render(OutputFormat::Markdown).unwrap();
        assert_eq!(text, "⚠️ Analysis error: boom\n");
    }
}
