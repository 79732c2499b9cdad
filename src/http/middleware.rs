//! The three HTTP middleware layers and their fixed composition order
//! (outermost first): rate limit → auth → CORS → route (§4.7.3).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use super::AppState;
use crate::rate_limit::{is_exempt_path, retry_after};

/// Constant-time comparison of the provided Bearer token against the
/// configured API key. Lengths are compared in constant time; when they
/// differ, a dummy comparison of matching length still runs so the total
/// work done never depends on how the lengths relate, only on the length of
/// `token`.
fn constant_time_compare(token: &str, expected: &str) -> bool {
    let len_eq = token.len().ct_eq(&expected.len());

    let bytes_eq = if token.len() == expected.len() {
        token.as_bytes().ct_eq(expected.as_bytes())
    } else {
        let dummy = vec![0u8; token.len()];
        token.as_bytes().ct_eq(&dummy)
    };

    (len_eq & bytes_eq).into()
}

/// Always sets the CORS headers; answers `OPTIONS` directly without
/// delegating further down the chain.
pub async fn cors_middleware(State(state): State<Arc<AppState>>, request: Request<Body>, next: Next) -> Response {
    let origin = HeaderValue::from_str(&state.config.cors_origin).unwrap_or_else(|_| HeaderValue::from_static("*"));

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut(), &origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), &origin);
    response
}

fn apply_cors_headers(headers: &mut axum::http::HeaderMap, origin: &HeaderValue) {
    headers.insert("Access-Control-Allow-Origin", origin.clone());
    headers.insert("Access-Control-Allow-Methods", HeaderValue::from_static("GET, POST, OPTIONS"));
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Last-Event-ID, Authorization"),
    );
    headers.insert("Access-Control-Expose-Headers", HeaderValue::from_static("Content-Type"));
}

/// Installed only when `config.api_key` is set. Exempts only `/health`;
/// notably `/metrics` is NOT exempt here even though it is exempt from rate
/// limiting.
pub async fn auth_middleware(State(state): State<Arc<AppState>>, request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let Some(expected) = state.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return next.run(request).await;
    };

    let header = request.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        tracing::warn!(path = %request.uri().path(), "rejecting request with no Authorization header");
        return (StatusCode::UNAUTHORIZED, "Authorization header required").into_response();
    };

    let Some(token) = header.strip_prefix("Bearer ") else {
        tracing::warn!(path = %request.uri().path(), "rejecting request with malformed Authorization header");
        return (StatusCode::UNAUTHORIZED, "Invalid authorization format, expected Bearer token").into_response();
    };

    if !constant_time_compare(token, expected) {
        tracing::warn!(path = %request.uri().path(), "rejecting request with invalid API key");
        return (StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
    }

    next.run(request).await
}

/// Installed only when `config.rate_limit_enabled()`. Exempts `/health` and
/// `/metrics`.
pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, request: Request<Body>, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    if is_exempt_path(request.uri().path()) {
        return next.run(request).await;
    }

    if !limiter.allow() {
        tracing::warn!(path = %request.uri().path(), "rate limit exceeded");
        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from_str(&retry_after().as_secs().to_string()).expect("retry-after is ascii digits"),
        );
        return response;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_compare_equal() {
        assert!(constant_time_compare("secret-key", "secret-key"));
    }

    #[test]
    fn constant_time_compare_different_content_same_length() {
        assert!(!constant_time_compare("secret-key", "secret-kex"));
    }

    #[test]
    fn constant_time_compare_different_length() {
        assert!(!constant_time_compare("short", "a-lot-longer"));
    }

    #[test]
    fn constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "a"));
        assert!(!constant_time_compare("a", ""));
    }

    #[test]
    fn constant_time_compare_differs_in_first_byte() {
        assert!(!constant_time_compare("aaaa", "baaa"));
    }
}
