//! Pipeline stages for one analysis.
//!
//! Each submodule implements one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ normalize ──▶ encode ──▶ llm
//! (allow-list) (500 px PNG)  (base64)  (capability → AnalysisOutcome)
//! ```
//!
//! 1. [`upload`]    admit JPG/JPEG/PNG/BMP/GIF and write it to a scoped temp file
//! 2. [`normalize`] decode, resize to the target width keeping aspect ratio,
//!    and write a PNG; CPU-bound, so it runs in `spawn_blocking`
//! 3. [`encode`]    base64-wrap the PNG for the multimodal request body
//! 4. [`llm`]       the only stage with network I/O; folds every capability
//!    failure into an outcome

pub mod encode;
pub mod llm;
pub mod normalize;
pub mod upload;
