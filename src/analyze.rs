//! Analysis entry points: upload → normalize → request.
//!
//! [`Analyzer`] owns a resolved [`ReportRequester`] and runs the whole flow
//! for one upload. Two scoped temp files are involved, the materialized
//! upload and the normalized PNG. Both are `NamedTempFile` handles owned by
//! this function's stack frame, so they are deleted on every exit path:
//! success, capability failure, decode error, or a panic unwinding through.

use crate::config::AnalysisConfig;
use crate::error::MedImgError;
use crate::output::{AnalysisOutcome, OutputFormat};
use crate::pipeline::llm::ReportRequester;
use crate::pipeline::normalize;
use crate::pipeline::upload::UploadedImage;
use crate::progress::AnalysisStage;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Runs the analysis pipeline with a fixed configuration.
///
/// Construction resolves the capability, so a missing credential surfaces
/// here, before any request is served.
#[derive(Clone)]
pub struct Analyzer {
    requester: ReportRequester,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, MedImgError> {
        let requester = ReportRequester::from_config(&config)?;
        Ok(Self { requester, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn requester(&self) -> &ReportRequester {
        &self.requester
    }

    /// Analyze one upload.
    ///
    /// # Returns
    /// `Ok(AnalysisOutcome)` whenever the image could be read, including when
    /// the capability failed (that is `AnalysisOutcome::Error`).
    ///
    /// # Errors
    /// `Err(MedImgError)` when the upload could not be materialized or
    /// decoded; nothing was sent to the capability.
    pub async fn analyze_upload(
        &self,
        upload: &UploadedImage,
    ) -> Result<AnalysisOutcome, MedImgError> {
        let start = Instant::now();
        let label = upload.label();
        info!("Starting analysis: {} ({})", label, upload.kind());

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_start(&label);
        }

        let result = self.run(upload).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(outcome) => info!(
                "Finished analysis of {} in {}ms (report: {})",
                label,
                elapsed_ms,
                outcome.is_report()
            ),
            Err(e) => warn!("Analysis of {} aborted: {}", label, e),
        }

        if let Some(ref cb) = self.config.progress_callback {
            let success = matches!(result, Ok(ref o) if o.is_report());
            cb.on_analysis_complete(success, elapsed_ms);
        }

        result
    }

    /// Analyze a local image file.
    pub async fn analyze_path(&self, path: impl AsRef<Path>) -> Result<AnalysisOutcome, MedImgError> {
        let upload = UploadedImage::from_path(path)?;
        self.analyze_upload(&upload).await
    }

    async fn run(&self, upload: &UploadedImage) -> Result<AnalysisOutcome, MedImgError> {
        let temp_dir = self.config.temp_dir.as_deref();

        self.stage(AnalysisStage::Materializing);
        let upload_file = upload.materialize(temp_dir)?;

        self.stage(AnalysisStage::Normalizing);
        let normalized = normalize::normalize_file_async(
            upload_file.path().to_path_buf(),
            self.config.target_width,
            self.config.temp_dir.clone(),
        )
        .await?;
        // The upload is no longer needed once the normalized copy exists.
        drop(upload_file);

        self.stage(AnalysisStage::Requesting);
        let outcome = self.requester.request(&normalized).await;
        drop(normalized);

        Ok(outcome)
    }

    fn stage(&self, stage: AnalysisStage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(stage);
        }
    }
}

/// Analyze a local image file with a one-off [`Analyzer`].
///
/// # Example
/// ```rust,no_run
/// use medimg_report::{analyze_file, AnalysisConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalysisConfig::builder()
///     .api_key(std::env::var("GOOGLE_API_KEY")?)
///     .build()?;
/// let outcome = analyze_file("chest_xray.png", &config).await?;
/// println!("{}", outcome.display_text());
/// # Ok(())
/// # }
/// ```
pub async fn analyze_file(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, MedImgError> {
    Analyzer::new(config.clone())?.analyze_path(path).await
}

/// Analyze in-memory image bytes with a one-off [`Analyzer`].
pub async fn analyze_bytes(
    bytes: &[u8],
    mime_type: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, MedImgError> {
    let upload = UploadedImage::from_upload(bytes.to_vec(), Some(mime_type), None)?;
    Analyzer::new(config.clone())?.analyze_upload(&upload).await
}

/// Analyze a local image and write the displayed text to `output`.
///
/// The file receives the report markdown, or the prefixed error message if
/// the capability failed, exactly what the web shell would show.
pub async fn analyze_to_file(
    path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, MedImgError> {
    analyze_to_file_as(path, output, OutputFormat::Markdown, config).await
}

/// [`analyze_to_file`] with an explicit [`OutputFormat`].
pub async fn analyze_to_file_as(
    path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    format: OutputFormat,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, MedImgError> {
    let outcome = analyze_file(path, config).await?;
    let output = output.as_ref();
    tokio::fs::write(output, outcome.render(format)?)
        .await
        .map_err(|source| MedImgError::OutputWriteFailed {
            path: output.to_path_buf(),
            source,
        })?;
    Ok(outcome)
}
