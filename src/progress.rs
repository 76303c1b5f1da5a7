//! Progress-callback trait for analysis pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to be told
//! which stage the pipeline is in. The CLI uses it to drive its spinner; the
//! web shell relies on the browser's own busy indicator instead.
//!
//! # Example
//!
//! ```rust
//! use medimg_report::{AnalysisConfig, AnalysisProgressCallback, AnalysisStage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl AnalysisProgressCallback for PrintStages {
//!     fn on_stage(&self, stage: AnalysisStage) {
//!         eprintln!("{stage}");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage, reported in this order for every analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    /// Writing the upload to a transient file.
    Materializing,
    /// Decoding and resizing to the target width.
    Normalizing,
    /// Waiting on the external analysis capability.
    Requesting,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisStage::Materializing => "Saving upload",
            AnalysisStage::Normalizing => "Resizing image",
            AnalysisStage::Requesting => "Analyzing the image",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as an analysis progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any work is done.
    fn on_analysis_start(&self, source: &str) {
        let _ = source;
    }

    /// Called on entry to each stage.
    fn on_stage(&self, stage: AnalysisStage) {
        let _ = stage;
    }

    /// Called once when the outcome is known.
    ///
    /// # Arguments
    /// * `success`    — true if a report was produced
    /// * `elapsed_ms` — wall-clock time since `on_analysis_start`
    fn on_analysis_complete(&self, success: bool, elapsed_ms: u64) {
        let _ = (success, elapsed_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
