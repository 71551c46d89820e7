//! User-facing error taxonomy of the pipeline.

use crate::finalize::FinalizeError;
use crate::overlay::MixError;
use crate::quota::QuotaExceeded;
use crate::source::ResolveError;
use crate::staging::{FileHandlerError, StagingError};
use crate::tagging::TagError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{stage}: {message}")]
    Upstream { stage: String, message: String },

    #[error("{0}")]
    MixEngine(String),

    #[error("{0}")]
    TagWrite(String),

    #[error("{0}")]
    TagVerify(String),

    #[error("{0}")]
    Configuration(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl PipelineError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Upstream { .. } => "upstream",
            Self::MixEngine(_) => "mix_engine",
            Self::TagWrite(_) => "tag_write",
            Self::TagVerify(_) => "tag_verify",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Upstream { .. } | Self::MixEngine(_) => StatusCode::BAD_GATEWAY,
            Self::TagWrite(_) | Self::TagVerify(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Reason safe to show to the end user. Engine, tag and internal
    /// failures carry paths and tool output, so only the stage is named.
    pub fn reason(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            Self::Upstream { stage, .. } => format!("{} failed, please try again later", stage),
            Self::MixEngine(_) => "mixing failed".to_string(),
            Self::TagWrite(_) => "writing tags failed".to_string(),
            Self::TagVerify(_) => "cover verification failed".to_string(),
            other => other.to_string(),
        }
    }
}

/// Response extension carrying [`PipelineError::kind`] out to the
/// logging middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorKind(pub &'static str);

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub reason: String,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", self.kind(), self);
        } else {
            warn!("Request rejected ({}): {}", self.kind(), self);
        }

        let body = ErrorResponse {
            error: self.kind(),
            reason: self.reason(),
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorKind(self.kind()));
        response
    }
}

impl From<QuotaExceeded> for PipelineError {
    fn from(e: QuotaExceeded) -> Self {
        Self::QuotaExceeded(e.0)
    }
}

impl From<ResolveError> for PipelineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidSource(msg) => Self::Validation(format!("Invalid source: {}", msg)),
            ResolveError::NotFound(what) => Self::NotFound(format!("Source not found: {}", what)),
            ResolveError::Upstream { stage, message } => Self::Upstream { stage, message },
            ResolveError::UnsupportedFormat(msg) => Self::UnsupportedFormat(msg),
            e @ ResolveError::PayloadTooLarge { .. } => Self::PayloadTooLarge(e.to_string()),
            ResolveError::NotConfigured(msg) => Self::Configuration(msg),
        }
    }
}

impl From<FileHandlerError> for PipelineError {
    fn from(e: FileHandlerError) -> Self {
        match e {
            FileHandlerError::InvalidFilename(name) => {
                Self::Validation(format!("Invalid filename: {}", name))
            }
            e @ FileHandlerError::FileTooLarge(..) => Self::PayloadTooLarge(e.to_string()),
            FileHandlerError::Io(e) => Self::Internal(e.into()),
        }
    }
}

impl From<StagingError> for PipelineError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::NotFound(id) => Self::NotFound(format!("Staging entry {} not found", id)),
            StagingError::Forbidden(id) => {
                Self::Forbidden(format!("Staging entry {} belongs to another user", id))
            }
            StagingError::FileHandler(e) => e.into(),
            StagingError::Store(e) => Self::Internal(e),
        }
    }
}

impl From<MixError> for PipelineError {
    fn from(e: MixError) -> Self {
        match e {
            e @ MixError::EmptySpec | e @ MixError::InvalidVolume(_) => {
                Self::Validation(e.to_string())
            }
            e => Self::MixEngine(e.to_string()),
        }
    }
}

impl From<TagError> for PipelineError {
    fn from(e: TagError) -> Self {
        match e {
            e @ TagError::Write(_) => Self::TagWrite(e.to_string()),
            e @ TagError::Verify(_) => Self::TagVerify(e.to_string()),
        }
    }
}

impl From<FinalizeError> for PipelineError {
    fn from(e: FinalizeError) -> Self {
        match e {
            FinalizeError::Tag(e) => e.into(),
            FinalizeError::Store(e) => Self::Internal(e),
            FinalizeError::Io(e) => Self::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases: Vec<(PipelineError, StatusCode, &str)> = vec![
            (PipelineError::Validation("x".into()), StatusCode::BAD_REQUEST, "validation"),
            (QuotaExceeded("cap".into()).into(), StatusCode::FORBIDDEN, "quota_exceeded"),
            (
                ResolveError::PayloadTooLarge { size: 2, max: 1 }.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
            ),
            (
                ResolveError::UnsupportedFormat("text/html".into()).into(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
            ),
            (
                ResolveError::upstream("video-platform extraction", "all clients failed").into(),
                StatusCode::BAD_GATEWAY,
                "upstream",
            ),
            (
                TagError::Verify("no image".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "tag_verify",
            ),
            (
                ResolveError::NotConfigured("no token".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
                "configuration",
            ),
            (
                StagingError::Forbidden("s1".into()).into(),
                StatusCode::FORBIDDEN,
                "forbidden",
            ),
        ];

        for (error, status, kind) in cases {
            assert_eq!(error.status_code(), status, "{}", kind);
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn test_internal_and_upstream_reasons_hide_details() {
        let internal = PipelineError::from(anyhow::anyhow!("disk exploded at /var/db"));
        assert_eq!(internal.reason(), "internal error");

        let upstream: PipelineError =
            ResolveError::upstream("audio-platform", "token abc123 rejected").into();
        assert!(!upstream.reason().contains("abc123"));

        let stderr = "/var/lib/jinglepress/scratch/staged_abc: Invalid data found when processing input";
        let mix: PipelineError =
            MixError::Engine(crate::media::MediaError::RunFailed(stderr.into())).into();
        assert_eq!(mix.reason(), "mixing failed");
        assert!(mix.to_string().contains("staged_abc"));

        let unreadable: PipelineError = MixError::Probe {
            path: "/var/lib/jinglepress/uploads/jingles/jingle-1.mp3".into(),
            source: crate::media::MediaError::ProbeFailed("moov atom not found".into()),
        }
        .into();
        assert_eq!(unreadable.reason(), "mixing failed");

        let write: PipelineError =
            TagError::Write("/var/lib/jinglepress/scratch/mixed_abc.mp3: permission denied".into()).into();
        assert_eq!(write.reason(), "writing tags failed");

        let verify: PipelineError =
            TagError::Verify("/var/lib/jinglepress/scratch/mixed_abc.mp3 has no image".into()).into();
        assert_eq!(verify.reason(), "cover verification failed");
    }

    #[test]
    fn test_response_carries_kind_extension() {
        let response = PipelineError::NotFound("s1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.extensions().get::<ErrorKind>(), Some(&ErrorKind("not_found")));
    }

    #[test]
    fn test_mix_validation_vs_engine() {
        assert_eq!(PipelineError::from(MixError::EmptySpec).kind(), "validation");
        let engine = MixError::Engine(crate::media::MediaError::RunFailed("x".into()));
        assert_eq!(PipelineError::from(engine).kind(), "mix_engine");
    }
}
