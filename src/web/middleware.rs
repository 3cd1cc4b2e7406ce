use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::utils::error::AppError;

pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// Rejects sync triggers that don't carry the configured token. Open when no
/// token is configured.
pub async fn require_sync_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.security.sync_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = presented_token(request.headers()).map(|token| tokens_match(token, expected));
    if presented == Some(true) {
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        client_ip = %extract_client_ip(request.headers()),
        uri = %request.uri(),
        token_present = presented.is_some(),
        "rejected sync trigger"
    );
    Err(AppError::Unauthorized)
}

/// `Authorization: Bearer <token>` wins over `X-Sync-Token`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer.or_else(|| {
        headers
            .get(SYNC_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    })
}

// Compares every byte so timing doesn't reveal the matching prefix length.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn extract_client_ip(headers: &HeaderMap) -> String {
    let ip_headers = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip", "x-client-ip"];

    for header_name in &ip_headers {
        if let Some(value) = headers.get(*header_name).and_then(|v| v.to_str().ok()) {
            // Take the first IP if there are multiple (comma-separated)
            let ip = value.split(',').next().unwrap_or(value).trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    "unknown".to_string()
}
