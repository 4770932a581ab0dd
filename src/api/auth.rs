// =============================================================================
// Bearer Token Authentication — Axum Extractor
// =============================================================================
//
// Chart rendering costs CPU and exchange request weight, so the chart route
// requires `Authorization: Bearer <token>` matching `SMC_ADMIN_TOKEN`.
// Comparison is performed in constant time.
//
//   async fn handler(_auth: AuthBearer, ...) { ... }
//
// With no token configured every authenticated request is refused.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

pub const ADMIN_TOKEN_ENV: &str = "SMC_ADMIN_TOKEN";

/// Compare two byte slices in constant time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // A length mismatch leaks only that the lengths differ.
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// =============================================================================
// Extractor
// =============================================================================

/// Succeeds only when the presented token matches `SMC_ADMIN_TOKEN`.
pub struct AuthBearer;

#[derive(Debug)]
pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

/// Check an `Authorization` header value against the expected token.
fn check_bearer<'a>(header: Option<&'a str>, expected: &str) -> Result<&'a str, AuthRejection> {
    if expected.is_empty() {
        warn!("{ADMIN_TOKEN_ENV} is not set — authenticated requests are rejected");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Server authentication not configured",
        });
    }

    let Some(token) = header.and_then(|v| v.strip_prefix("Bearer ")) else {
        warn!("Missing or malformed Authorization header");
        return Err(AuthRejection {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing or invalid authorization token",
        });
    };

    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        warn!("Invalid admin token presented");
        return Err(AuthRejection {
            status: StatusCode::FORBIDDEN,
            message: "Invalid authorization token",
        });
    }

    Ok(token)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Read per request so the token can rotate without a restart.
        let expected = std::env::var(ADMIN_TOKEN_ENV).unwrap_or_default();

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        check_bearer(header, &expected).map(|_| AuthBearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_identical() {
        assert!(constant_time_eq(b"hello", b"hello"));
    }

    #[test]
    fn constant_time_eq_different() {
        assert!(!constant_time_eq(b"hello", b"world"));
    }

    #[test]
    fn constant_time_eq_different_lengths() {
        assert!(!constant_time_eq(b"short", b"longer_string"));
    }

    #[test]
    fn constant_time_eq_single_bit_diff() {
        assert!(!constant_time_eq(b"\x00", b"\x01"));
    }

    #[test]
    fn bearer_accepted() {
        assert_eq!(check_bearer(Some("Bearer s3cret"), "s3cret").unwrap(), "s3cret");
    }

    #[test]
    fn bearer_rejections() {
        assert_eq!(check_bearer(Some("Bearer s3cret"), "").unwrap_err().status, StatusCode::FORBIDDEN);
        assert_eq!(check_bearer(None, "s3cret").unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(check_bearer(Some("Basic abc"), "s3cret").unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(check_bearer(Some("Bearer wrong!"), "s3cret").unwrap_err().status, StatusCode::FORBIDDEN);
    }
}
