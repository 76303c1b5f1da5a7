//! Route handlers for the web shell.

use super::page::{render_page, View};
use super::AppState;
use crate::error::MedImgError;
use crate::pipeline::upload::UploadedImage;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error, warn};

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "image";

/// A request the shell refused before (or instead of) running the pipeline.
#[derive(Debug)]
pub struct ShellError {
    pub status: StatusCode,
    pub message: String,
}

impl From<MedImgError> for ShellError {
    fn from(e: MedImgError) -> Self {
        if !e.is_user_error() {
            error!("Analysis failed on the server side: {}", e);
        }
        let status = match e {
            MedImgError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MedImgError::EmptyUpload | MedImgError::MalformedUpload { .. } => {
                StatusCode::BAD_REQUEST
            }
            MedImgError::ImageDecode { .. } | MedImgError::ImageTooLarge { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MedImgError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

/// Pull the `image` field out of the form.
///
/// `Ok(None)` means nothing was uploaded: no such field, or the empty part a
/// browser sends for an untouched file input.
pub async fn read_upload(multipart: &mut Multipart) -> Result<Option<UploadedImage>, ShellError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(ShellError {
                    status: e.status(),
                    message: MedImgError::MalformedUpload {
                        detail: e.body_text(),
                    }
                    .to_string(),
                })
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| ShellError {
            status: e.status(),
            message: MedImgError::MalformedUpload {
                detail: e.body_text(),
            }
            .to_string(),
        })?;

        if bytes.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
            debug!("Form submitted without a file");
            return Ok(None);
        }

        debug!(
            "Received upload {:?} ({:?}, {} bytes)",
            file_name,
            content_type,
            bytes.len()
        );
        let upload =
            UploadedImage::from_upload(bytes.to_vec(), content_type.as_deref(), file_name.as_deref())
                .map_err(|e| {
                    warn!("Rejected upload {:?}: {}", file_name, e);
                    ShellError::from(e)
                })?;
        return Ok(Some(upload));
    }
}

/// `GET /`
pub async fn index() -> Html<String> {
    Html(render_page(&View::Idle))
}

/// `POST /analyze`: the form target; always answers with the full page.
pub async fn analyze_form(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(u)) => u,
        Ok(None) => return Html(render_page(&View::Idle)).into_response(),
        Err(e) => {
            let page = render_page(&View::Rejected { message: e.message });
            return (e.status, Html(page)).into_response();
        }
    };

    match state.analyzer.analyze_upload(&upload).await {
        Ok(outcome) => Html(render_page(&View::Analyzed {
            upload: &upload,
            outcome: &outcome,
        }))
        .into_response(),
        Err(e @ (MedImgError::ImageDecode { .. } | MedImgError::ImageTooLarge { .. })) => {
            let page = render_page(&View::Unreadable {
                upload: &upload,
                message: e.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
        }
        Err(e) => {
            let shell = ShellError::from(e);
            let page = render_page(&View::Rejected {
                message: shell.message,
            });
            (shell.status, Html(page)).into_response()
        }
    }
}

/// `POST /api/analyze`: same pipeline, JSON body.
///
/// A capability failure is still a 200 with `"status": "error"`; only
/// refusals of the upload itself use a 4xx/5xx status.
pub async fn analyze_api(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "idle", "message": "no image uploaded" })),
            )
                .into_response()
        }
        Err(e) => return rejected(e),
    };

    match state.analyzer.analyze_upload(&upload).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => rejected(ShellError::from(e)),
    }
}

fn rejected(e: ShellError) -> Response {
    (
        e.status,
        Json(json!({ "status": "rejected", "message": e.message })),
    )
        .into_response()
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
