//! Caller identity as asserted by the authentication gateway in front of
//! this service. Header values are trusted verbatim.

use super::state::ServerState;
use crate::quota::{Plan, UserContext};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

pub const HEADER_USER_ID: &str = "X-User-Id";
pub const HEADER_USER_PLAN: &str = "X-User-Plan";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: UserContext,
}

pub enum SessionExtractionError {
    AccessDenied,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_session_from_request_parts(parts: &Parts) -> Option<Session> {
    let user_id = match header_value(parts, HEADER_USER_ID) {
        Some(id) => id,
        None => {
            debug!("No {} header.", HEADER_USER_ID);
            return None;
        }
    };

    let plan = match header_value(parts, HEADER_USER_PLAN).and_then(|p| Plan::parse(&p)) {
        Some(plan) => plan,
        None => {
            debug!("Missing or unknown {} for user {}", HEADER_USER_PLAN, user_id);
            return None;
        }
    };

    Some(Session {
        user: UserContext::new(user_id, plan),
    })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        _ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts).ok_or(SessionExtractionError::AccessDenied)
    }
}
