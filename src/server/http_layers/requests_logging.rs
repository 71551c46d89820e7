//! Request logging middleware

use super::super::session::HEADER_USER_ID;
use super::super::state::ServerState;
use crate::error::ErrorKind;
use crate::server::metrics::{endpoint_label, record_http_request};
use axum::extract::State;
use axum::{
    body::Body,
    http::{header, header::HeaderMap, HeaderName, Request},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::info;

#[derive(PartialEq, PartialOrd, Clone, Debug, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    Path,
    Headers,
}

impl Default for RequestsLoggingLevel {
    fn default() -> Self {
        Self::Path
    }
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const REDACTED: &str = "<redacted>";

fn is_sensitive(name: &HeaderName) -> bool {
    name == header::AUTHORIZATION || name == header::COOKIE || name == header::SET_COOKIE
}

/// Who the gateway says is calling, for the request line.
fn caller(headers: &HeaderMap) -> &str {
    headers
        .get(HEADER_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
}

/// Human-readable declared body size, e.g. "12.5 MB". Audio uploads are
/// summarized this way and never logged.
fn declared_size(headers: &HeaderMap) -> Option<String> {
    let size = headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()?;
    if size == 0 {
        return None;
    }
    Some(format!(
        "{:.1}",
        byte_unit::Byte::from(size).get_appropriate_unit(byte_unit::UnitType::Decimal)
    ))
}

fn log_headers(direction: &str, headers: &HeaderMap) {
    info!("  {} Headers:", direction);
    for (name, value) in headers.iter() {
        if is_sensitive(name) {
            info!("    {:?}: {}", name, REDACTED);
        } else {
            info!("    {:?}: {:?}", name, value);
        }
    }
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();

    let start = Instant::now();

    let method = request.method().to_string();
    let path = endpoint_label(request.uri().path());

    if level > RequestsLoggingLevel::None {
        let user = caller(request.headers()).to_string();
        match declared_size(request.headers()) {
            Some(size) => info!(">>> {} {} [{}] ({})", method, request.uri(), user, size),
            None => info!(">>> {} {} [{}]", method, request.uri(), user),
        }
    }

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }

    let response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }

    let status = response.status().as_u16();
    let duration: std::time::Duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        match response.extensions().get::<ErrorKind>() {
            Some(kind) => info!("<<< {} {} ({}ms)", status, kind.0, duration.as_millis()),
            None => info!("<<< {} ({}ms)", status, duration.as_millis()),
        }
    }

    record_http_request(&method, &path, status, duration);

    response
}
