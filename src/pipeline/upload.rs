//! Upload intake: allow-list check and materialization to a transient file.
//!
//! An upload is admitted only if its declared media type (or, when the
//! browser sends none, its file extension) is one of JPG, JPEG, PNG, BMP or
//! GIF. The bytes are written to a `NamedTempFile` so the normalizer can open
//! them by path; the file is deleted when the handle is dropped, whichever
//! way the request ends.

use crate::error::MedImgError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// File extensions the upload surface accepts.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// Media types the upload surface accepts.
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/bmp",
    "image/gif",
];

/// Value of an `<input type="file" accept=…>` attribute matching the allow-list.
pub fn accept_attribute() -> String {
    ALLOWED_EXTENSIONS
        .iter()
        .map(|e| format!(".{e}"))
        .chain(ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Raster formats admitted by the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Gif,
}

impl ImageKind {
    /// Parse a declared media type. Parameters (`; charset=…`) and case are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            // Legacy aliases still sent by older browsers and mail clients.
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/bmp" | "image/x-ms-bmp" | "image/x-bmp" => Some(ImageKind::Bmp),
            "image/gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    /// Parse a file extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "bmp" => Some(ImageKind::Bmp),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Gif => "image/gif",
        }
    }

    /// Extension used for the materialized temp file (the media subtype).
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Bmp => "bmp",
            ImageKind::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Media types browsers send when they don't know better.
fn is_generic_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    essence.is_empty() || essence.eq_ignore_ascii_case("application/octet-stream")
}

/// Raw upload bytes plus their admitted type. Lives for one request.
#[derive(Clone)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    kind: ImageKind,
    file_name: Option<String>,
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("bytes", &self.bytes.len())
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Vec<u8>>, kind: ImageKind) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Admit an upload from the web form.
    ///
    /// A specific declared media type decides on its own; a missing or
    /// generic one (`application/octet-stream`) falls back to the file
    /// extension. Anything outside the allow-list is rejected.
    pub fn from_upload(
        bytes: impl Into<Vec<u8>>,
        declared_mime: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Self, MedImgError> {
        let bytes = bytes.into();
        let by_name = file_name.and_then(|n| ImageKind::from_path(Path::new(n)));

        let kind = match declared_mime {
            Some(m) if !is_generic_mime(m) => ImageKind::from_mime(m).ok_or_else(|| {
                MedImgError::UnsupportedType {
                    declared: m.to_string(),
                }
            })?,
            _ => by_name.ok_or_else(|| MedImgError::UnsupportedType {
                declared: file_name
                    .or(declared_mime)
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };

        if bytes.is_empty() {
            return Err(MedImgError::EmptyUpload);
        }

        Ok(Self {
            bytes,
            kind,
            file_name: file_name.filter(|n| !n.is_empty()).map(str::to_string),
        })
    }

    /// Load a local file, admitting it by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MedImgError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MedImgError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let kind = ImageKind::from_path(path).ok_or_else(|| MedImgError::UnsupportedType {
            declared: path.display().to_string(),
        })?;
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MedImgError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => MedImgError::TempFile { source: e },
        })?;
        if bytes.is_empty() {
            return Err(MedImgError::EmptyUpload);
        }
        let name = path.file_name().map(|n| n.to_string_lossy().to_string());
        Ok(Self {
            bytes,
            kind,
            file_name: name,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Human-readable label for logs and captions.
    pub fn label(&self) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| format!("upload.{}", self.kind.extension()))
    }

    /// `data:` URI of the original bytes, for the preview next to the report.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.kind.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Write the upload to a scoped temp file `medimg-upload-*.{ext}`.
    ///
    /// The returned handle owns the file; dropping it deletes it.
    pub fn materialize(&self, temp_dir: Option<&Path>) -> Result<NamedTempFile, MedImgError> {
        let suffix = format!(".{}", self.kind.extension());
        let mut file = scoped_temp_file(temp_dir, "medimg-upload-", &suffix)?;
        file.write_all(&self.bytes)
            .and_then(|_| file.flush())
            .map_err(|source| MedImgError::TempFile { source })?;
        debug!(
            "Materialized {} ({} bytes) → {}",
            self.label(),
            self.bytes.len(),
            file.path().display()
        );
        Ok(file)
    }
}

/// Create a named temp file in `dir` (or the system temp dir).
pub(crate) fn scoped_temp_file(
    dir: Option<&Path>,
    prefix: &str,
    suffix: &str,
) -> Result<NamedTempFile, MedImgError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(suffix);
    let result = match dir {
        Some(d) => builder.tempfile_in(d),
        None => builder.tempfile(),
    };
    result.map_err(|source| MedImgError::TempFile { source })
}

/// Paths of every file in `dir`; used by callers checking for leftovers.
pub fn list_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect()
}
