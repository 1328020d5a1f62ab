//! API Middleware
//!
//! Bearer-token authentication and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;

use super::AppState;

/// Header carrying the caller's correlation id
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// User resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

// =========================================================================
// Authentication Middleware
// =========================================================================

/// Validate the bearer token and attach the caller's identity.
///
/// Inserts `AuthenticatedUser` and an `OperationContext` whose cancellation
/// token is a child of the server shutdown token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::MissingHeader("Authorization".to_string()))?;

    let username = state.auth.validate_token(header)?;

    let context = OperationContext::new()
        .with_username(username.clone())
        .with_correlation_id(correlation_id(&headers).unwrap_or_else(Uuid::new_v4))
        .with_cancellation(state.shutdown.child_token());

    request.extensions_mut().insert(AuthenticatedUser { username });
    request.extensions_mut().insert(context.clone());

    // Handed back out so the request log can report who did what
    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    Ok(response)
}

/// Correlation id supplied by the caller, if it is a valid UUID
pub fn correlation_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Headers whose values never reach the logs (names are lowercase in `http`)
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Header list safe to log: sensitive values are replaced
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = match value.to_str() {
                _ if SENSITIVE_HEADERS.contains(&name.as_str()) => "[REDACTED]",
                Ok(value) => value,
                Err(_) => "[invalid utf8]",
            };
            (name.to_string(), shown.to_string())
        })
        .collect()
}

/// Log each request and its outcome.
///
/// On authenticated routes the caller and correlation id come from the
/// request's `OperationContext`, and the correlation id is echoed back in
/// the `X-Correlation-Id` response header.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let supplied_id = correlation_id(request.headers());

    tracing::debug!(
        method = %method,
        uri = %uri,
        correlation_id = ?supplied_id,
        headers = ?mask_headers_for_logging(request.headers()),
        "Request received"
    );

    let start = std::time::Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed();

    let (username, correlation_id) = match response.extensions().get::<OperationContext>() {
        Some(context) => (context.username.clone(), context.correlation_id),
        None => (None, supplied_id),
    };

    if let Some(id) = correlation_id {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
    }

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        username = username.as_deref().unwrap_or("-"),
        correlation_id = ?correlation_id,
        "Request handled"
    );

    response
}
