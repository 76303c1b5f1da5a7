//! Image encoding: normalized temp PNG → base64 `ImageData`.
//!
//! Multimodal APIs take images inline as base64 in the JSON body. The
//! normalizer already wrote a PNG, so this stage only reads the temp file
//! back and wraps it; no re-encoding happens here.

use crate::error::MedImgError;
use crate::pipeline::normalize::NormalizedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap already-encoded image bytes for the request body.
pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, mime_type)
}

/// Read the normalized temp file and wrap it as `ImageData`.
pub async fn encode_normalized(image: &NormalizedImage) -> Result<ImageData, MedImgError> {
    let bytes = tokio::fs::read(image.path())
        .await
        .map_err(|source| MedImgError::TempFile { source })?;
    Ok(encode_bytes(&bytes, image.mime_type()))
}
