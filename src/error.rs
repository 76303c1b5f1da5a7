//! Error types for the medimg-report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MedImgError`] — the request (or the whole process, for configuration
//!   errors) cannot proceed: missing credential, unsupported upload, an image
//!   that does not decode, temp-file I/O. Returned as `Err(MedImgError)`.
//!
//! * [`CapabilityError`] — the external analysis capability failed (network,
//!   quota, malformed response). These never escape the requester: they are
//!   folded into [`crate::output::AnalysisOutcome::Error`] so the interactive
//!   session keeps running and the user can simply try again.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal and per-request errors returned by the medimg-report library.
#[derive(Debug, Error)]
pub enum MedImgError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// No API credential was supplied for the analysis capability.
    #[error(
        "No API key configured for provider '{provider}'.\n\
Set GOOGLE_API_KEY (or pass --api-key) before starting."
    )]
    MissingCredential { provider: String },

    /// The named LLM provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The upload's declared type is not on the allow-list.
    #[error("Unsupported file type '{declared}'. Supported formats: JPG, JPEG, PNG, BMP, GIF")]
    UnsupportedType { declared: String },

    /// The request carried an image field with no bytes in it.
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The upload is not a decodable raster image.
    #[error("Could not read image: {detail}")]
    ImageDecode { detail: String },

    /// The normalized image would exceed the pixel budget (a very tall,
    /// very narrow source scaled up to the target width).
    #[error(
        "Image too large after resizing: {width}×{height} exceeds {limit} pixels. \
Crop very tall or very narrow images before uploading."
    )]
    ImageTooLarge { width: u32, height: u64, limit: u64 },

    /// Re-encoding the normalized image failed.
    #[error("Failed to encode normalized image: {detail}")]
    ImageEncode { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Creating, writing or reading a transient file failed.
    #[error("Temporary file error: {source}")]
    TempFile {
        #[source]
        source: std::io::Error,
    },

    /// Could not write the report to the requested output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The web shell could not bind its listen address.
    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedImgError {
    /// Whether the error was caused by what the user sent rather than by
    /// the server. The web shell uses this to pick a 4xx over a 5xx.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MedImgError::UnsupportedType { .. }
                | MedImgError::EmptyUpload
                | MedImgError::MalformedUpload { .. }
                | MedImgError::FileNotFound { .. }
                | MedImgError::ImageDecode { .. }
                | MedImgError::ImageTooLarge { .. }
        )
    }
}

/// A failure reported by (or while talking to) the external analysis capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The request never completed (DNS, TLS, connection reset, …).
    #[error("request to {provider} failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The API answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// The API answered 2xx but the body was not what we expected.
    #[error("malformed response from {provider}: {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// The model refused to answer (safety filter, blocked prompt).
    #[error("{provider} blocked the request: {reason}")]
    Blocked { provider: String, reason: String },

    /// The model answered with no text at all.
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    /// Error surfaced by an `edgequake_llm` provider.
    #[error("{0}")]
    Provider(String),
}

impl CapabilityError {
    /// True for HTTP 429 (quota or rate limit exhausted).
    pub fn is_quota(&self) -> bool {
        matches!(self, CapabilityError::Http { status: 429, .. })
    }
}
