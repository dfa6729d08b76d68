//! API Middleware
//!
//! Request-user extraction and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;

/// Header naming the user an entry belongs to
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";

/// Request user from X-Request-User-Id header
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: Uuid,
}

/// Whether requests must identify their user
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUserPolicy {
    pub required: bool,
}

// =========================================================================
// Request User Middleware
// =========================================================================

/// Parse X-Request-User-Id into a [`RequestUser`] extension.
///
/// A malformed header is always rejected. A missing header is rejected only
/// when the policy requires one; otherwise the request runs unscoped.
pub async fn request_user_middleware(
    State(policy): State<RequestUserPolicy>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(REQUEST_USER_HEADER)
        .map(|v| v.to_str().ok().and_then(|s| Uuid::parse_str(s.trim()).ok()));

    match header {
        Some(Some(user_id)) => {
            request.extensions_mut().insert(RequestUser { user_id });
        }
        Some(None) => return Err(AppError::InvalidUserId(REQUEST_USER_HEADER.to_string())),
        None if policy.required => {
            return Err(AppError::MissingHeader(REQUEST_USER_HEADER.to_string()))
        }
        None => {}
    }

    Ok(next.run(request).await)
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let request_user = request
        .extensions()
        .get::<RequestUser>()
        .map(|user| user.user_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_user = ?request_user,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}
