//! Pipeline HTTP routes.
//!
//! Provides endpoints for:
//! - Ingesting audio from external sources and direct uploads
//! - Finalizing, previewing and remixing staged or published audio
//! - Managing the caller's saved jingles

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::debug;

use crate::error::PipelineError;
use crate::library::AudioMetadata;
use crate::overlay::JinglePosition;
use crate::pipeline::{FinalizeOptions, MixRequest, PlacementRequest};
use crate::server::session::Session;
use crate::server::state::{GuardedPipeline, ServerState};
use crate::source::SourceKind;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub source_kind: String,
    pub locator: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestAndPublishBody {
    pub source_kind: String,
    pub locator: String,
    #[serde(default)]
    pub metadata: AudioMetadata,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeBody {
    #[serde(default)]
    pub metadata: AudioMetadata,
    #[serde(default)]
    pub mix: MixRequest,
    /// Base64-encoded cover image
    #[serde(default)]
    pub cover_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlacementsBody {
    pub placements: Vec<PlacementRequest>,
}

// =============================================================================
// Helpers
// =============================================================================

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, PipelineError> {
    body.map(|Json(value)| value)
        .map_err(|e| PipelineError::Validation(format!("Invalid request body: {}", e.body_text())))
}

fn parse_source_kind(value: &str) -> Result<SourceKind, PipelineError> {
    match SourceKind::parse(value.trim()) {
        Some(SourceKind::Upload) => Err(PipelineError::Validation(
            "Uploads go through /v1/upload".to_string(),
        )),
        Some(kind) => Ok(kind),
        None => Err(PipelineError::Validation(format!(
            "Unknown source kind: {}",
            value
        ))),
    }
}

/// A file part plus the text parts of a multipart form.
#[derive(Default)]
struct MultipartForm {
    filename: Option<String>,
    data: Option<Vec<u8>>,
    fields: Vec<(String, String)>,
}

impl MultipartForm {
    async fn read(mut multipart: Multipart) -> Result<Self, PipelineError> {
        let mut form = MultipartForm::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    return Err(PipelineError::Validation(format!(
                        "Malformed multipart body: {}",
                        e.body_text()
                    )))
                }
            };
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                form.filename = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    PipelineError::Validation(format!("Failed to read file: {}", e.body_text()))
                })?;
                form.data = Some(bytes.to_vec());
            } else {
                let value = field.text().await.map_err(|e| {
                    PipelineError::Validation(format!("Failed to read {}: {}", name, e.body_text()))
                })?;
                form.fields.push((name, value));
            }
        }
        Ok(form)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn file(&mut self) -> Result<(String, Vec<u8>), PipelineError> {
        let filename = match self.filename.take() {
            Some(f) if !f.is_empty() => f,
            _ => return Err(PipelineError::Validation("No filename provided".to_string())),
        };
        match self.data.take() {
            Some(d) if !d.is_empty() => Ok((filename, d)),
            _ => Err(PipelineError::Validation("No file data provided".to_string())),
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

async fn get_quota(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
) -> Result<impl IntoResponse, PipelineError> {
    Ok(Json(pipeline.quota_status(&session.user)?))
}

/// POST /ingest - Fetch and stage audio from an external source
async fn post_ingest(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    body: Result<Json<IngestBody>, JsonRejection>,
) -> Result<impl IntoResponse, PipelineError> {
    let body = json_body(body)?;
    let kind = parse_source_kind(&body.source_kind)?;
    let staged = pipeline.ingest(&session.user, kind, &body.locator).await?;
    Ok((StatusCode::CREATED, Json(staged)))
}

/// POST /ingest/publish - Ingest and finalize in one step
async fn post_ingest_and_publish(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    body: Result<Json<IngestAndPublishBody>, JsonRejection>,
) -> Result<impl IntoResponse, PipelineError> {
    let body = json_body(body)?;
    let kind = parse_source_kind(&body.source_kind)?;
    let outcome = pipeline
        .ingest_and_publish(&session.user, kind, &body.locator, body.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /upload - Stage a file sent as multipart/form-data
async fn post_upload(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    multipart: Multipart,
) -> Result<impl IntoResponse, PipelineError> {
    let (filename, data) = MultipartForm::read(multipart).await?.file()?;
    debug!(
        "User {} uploading {} ({} bytes)",
        session.user.user_id,
        filename,
        data.len()
    );
    let staged = pipeline.upload(&session.user, &filename, data).await?;
    Ok((StatusCode::CREATED, Json(staged)))
}

/// POST /staging/{id}/finalize - Mix, tag and publish a staged file
async fn post_finalize(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    Path(staging_id): Path<String>,
    body: Result<Json<FinalizeBody>, JsonRejection>,
) -> Result<impl IntoResponse, PipelineError> {
    let body = json_body(body)?;
    let cover = match body.cover_base64.as_deref().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => Some(
            STANDARD
                .decode(encoded)
                .map_err(|e| PipelineError::Validation(format!("Invalid cover_base64: {}", e)))?,
        ),
        _ => None,
    };

    let outcome = pipeline
        .finalize_staged(
            &session.user,
            &staging_id,
            FinalizeOptions {
                metadata: body.metadata,
                mix: body.mix,
                cover,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /staging/{id}/preview - Short mixed preview, the staged file is kept
async fn post_preview(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    Path(staging_id): Path<String>,
    body: Result<Json<PlacementsBody>, JsonRejection>,
) -> Result<impl IntoResponse, PipelineError> {
    let body = json_body(body)?;
    let bytes = pipeline
        .preview(&session.user, &staging_id, &body.placements)
        .await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes))
}

/// POST /audio/{id}/mix - Mix jingles over a published asset
async fn post_remix(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    Path(audio_id): Path<String>,
    body: Result<Json<PlacementsBody>, JsonRejection>,
) -> Result<impl IntoResponse, PipelineError> {
    let body = json_body(body)?;
    let outcome = pipeline
        .remix(&session.user, &audio_id, &body.placements)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn get_jingles(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
) -> Result<impl IntoResponse, PipelineError> {
    Ok(Json(pipeline.list_jingles(&session.user)?))
}

/// POST /jingles - Save a jingle (multipart: file, name, position, volume)
async fn post_jingle(
    session: Session,
    State(pipeline): State<GuardedPipeline>,
    multipart: Multipart,
) -> Result<impl IntoResponse, PipelineError> {
    let mut form = MultipartForm::read(multipart).await?;
    let (filename, data) = form.file()?;

    let position = match form.field("position") {
        Some(value) => Some(JinglePosition::parse(value).ok_or_else(|| {
            PipelineError::Validation(format!("Unknown jingle position: {}", value))
        })?),
        None => None,
    };
    let volume = match form.field("volume") {
        Some(value) => Some(
            value
                .parse::<f32>()
                .map_err(|_| PipelineError::Validation(format!("Invalid volume: {}", value)))?,
        ),
        None => None,
    };
    let name = form.field("name").map(str::to_string);

    let jingle = pipeline
        .add_jingle(&session.user, &filename, data, name, position, volume)
        .await?;
    Ok((StatusCode::CREATED, Json(jingle)))
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the pipeline routes.
///
/// - GET /quota - Today's quota status
/// - POST /ingest - Stage audio from an external source
/// - POST /ingest/publish - Stage and publish in one step
/// - POST /upload - Stage an uploaded file
/// - POST /staging/{id}/finalize - Publish a staged file
/// - POST /staging/{id}/preview - Preview a mix of a staged file
/// - POST /audio/{id}/mix - Remix a published asset
/// - GET/POST /jingles - List or save jingles
pub fn pipeline_routes() -> Router<ServerState> {
    Router::new()
        .route("/quota", get(get_quota))
        .route("/ingest", post(post_ingest))
        .route("/ingest/publish", post(post_ingest_and_publish))
        .route("/upload", post(post_upload))
        .route("/staging/{id}/finalize", post(post_finalize))
        .route("/staging/{id}/preview", post(post_preview))
        .route("/audio/{id}/mix", post(post_remix))
        .route("/jingles", get(get_jingles).post(post_jingle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_kind() {
        assert_eq!(parse_source_kind("direct-url").unwrap(), SourceKind::DirectUrl);
        assert_eq!(
            parse_source_kind(" audio-platform ").unwrap(),
            SourceKind::AudioPlatform
        );
        assert_eq!(parse_source_kind("upload").unwrap_err().kind(), "validation");
        assert_eq!(parse_source_kind("ftp").unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_finalize_body_defaults() {
        let body: FinalizeBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.mix, MixRequest::None);
        assert_eq!(body.metadata, AudioMetadata::default());
        assert!(body.cover_base64.is_none());
    }
}
