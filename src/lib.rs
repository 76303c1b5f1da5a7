//! # medimg-report
//!
//! Upload a medical image and get back a structured, AI-generated report.
//!
//! The image is normalized to a fixed width, sent together with a fixed
//! five-section prompt to a multimodal model (Gemini by default, with Google
//! Search grounding for the literature section), and the returned markdown
//! is shown verbatim. A failure of the model is a normal outcome: the user
//! sees `⚠️ Analysis error: …` and may simply try again.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Upload     allow-list check, materialize to a scoped temp file
//!  ├─ 2. Normalize  decode, resize to 500 px wide, re-encode PNG (spawn_blocking)
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. Request    prompt + image → capability → AnalysisOutcome
//!  └─ 5. Display    markdown panel (web), stdout/file (CLI), JSON (API)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medimg_report::{analyze_file, AnalysisConfig, AnalysisOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .api_key(std::env::var("GOOGLE_API_KEY")?)
//!         .build()?;
//!     match analyze_file("knee_mri.jpg", &config).await? {
//!         AnalysisOutcome::Report(r) => println!("{}", r.markdown),
//!         AnalysisOutcome::Error(e) => eprintln!("{e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medimg` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! medimg-report = { version = "0.1", default-features = false }
//! ```
//!
//! The output is not a diagnosis. Reports must be reviewed by a qualified
//! healthcare professional.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod capability;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_bytes, analyze_file, analyze_to_file, analyze_to_file_as, Analyzer};
pub use capability::{
    AnalysisCapability, CapabilityRequest, CapabilityResponse, GeminiCapability, LlmCapability,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{CapabilityError, MedImgError};
pub use output::{
    AnalysisFailure, AnalysisOutcome, AnalysisReport, OutputFormat, ReportStats, WebSource,
};
pub use pipeline::upload::{ImageKind, UploadedImage};
pub use progress::{AnalysisProgressCallback, AnalysisStage, NoopProgressCallback, ProgressCallback};
pub use server::{router, serve, ServerConfig};
