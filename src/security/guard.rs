//! Transport-level request guard.
//!
//! # Responsibilities
//! - Reject requests advertising the vulnerable component-stream transport
//!   before any body is read
//! - Reject requests carrying the framework server-action marker header
//! - Reject multipart uploads that smuggle the component-stream marker or a
//!   malformed boundary
//! - Reject URLs containing curated attack literals
//!
//! # Design Decisions
//! - All checks are independent ORs; the first match wins
//! - Checks run on metadata only, so the guard is cheap enough to sit in
//!   front of every request

use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode, Uri};

use crate::security::patterns::PatternSet;

/// Component-stream content type used by the vulnerable transport.
const COMPONENT_STREAM_MARKER: &str = "text/x-component";

/// Server-action marker header. Presence alone is enough to block.
const SERVER_ACTION_HEADER: &str = "next-action";

/// A short-circuit rejection. `None` from [`TransportGuard::check`] means
/// the request may proceed to body handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision {
    pub error: String,
    pub message: String,
    pub status: StatusCode,
}

impl GuardDecision {
    fn transport_block() -> Self {
        Self {
            error: "Forbidden".to_string(),
            message: "Request blocked for security reasons".to_string(),
            status: StatusCode::FORBIDDEN,
        }
    }

    fn url_block() -> Self {
        Self {
            error: "Forbidden".to_string(),
            message: "Request contains forbidden patterns".to_string(),
            status: StatusCode::FORBIDDEN,
        }
    }
}

/// Header and URL inspection applied before route dispatch.
#[derive(Debug, Clone)]
pub struct TransportGuard {
    patterns: Arc<PatternSet>,
}

impl TransportGuard {
    pub fn new(patterns: Arc<PatternSet>) -> Self {
        Self { patterns }
    }

    /// Inspect request metadata. Returns a decision on the first matching
    /// check, `None` when every check passes.
    pub fn check(&self, headers: &HeaderMap, uri: &Uri) -> Option<GuardDecision> {
        if accept_requests_component_stream(headers) {
            return Some(GuardDecision::transport_block());
        }

        if headers.contains_key(SERVER_ACTION_HEADER) {
            return Some(GuardDecision::transport_block());
        }

        if multipart_is_suspicious(headers) {
            return Some(GuardDecision::transport_block());
        }

        let url_text = uri.to_string();
        if self.patterns.matches_url_literal(&url_text) {
            return Some(GuardDecision::url_block());
        }

        None
    }
}

fn accept_requests_component_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase().contains(COMPONENT_STREAM_MARKER))
        .unwrap_or(false)
}

/// Multipart content types are blocked when they also reference the
/// component-stream marker, or when their boundary token carries characters
/// outside the RFC 2046 token set (a smuggling indicator).
fn multipart_is_suspicious(headers: &HeaderMap) -> bool {
    let content_type = match headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        Some(v) => v.to_lowercase(),
        None => return false,
    };

    if !content_type.contains("multipart/") {
        return false;
    }

    if content_type.contains(COMPONENT_STREAM_MARKER) {
        return true;
    }

    if let Some(boundary) = content_type
        .split("boundary=")
        .nth(1)
        .map(|b| b.split(';').next().unwrap_or(b).trim())
    {
        let boundary = boundary.trim_matches('"');
        if boundary.is_empty() || !boundary.chars().all(is_boundary_char) {
            return true;
        }
    }

    false
}

fn is_boundary_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn guard() -> TransportGuard {
        TransportGuard::new(Arc::new(PatternSet::baseline()))
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn clean_request_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(guard().check(&headers, &uri("/api/events?page=2")), None);
    }

    #[test]
    fn component_stream_accept_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/x-component"));
        let decision = guard().check(&headers, &uri("/")).expect("blocked");
        assert_eq!(decision.status, StatusCode::FORBIDDEN);
        assert_eq!(decision.error, "Forbidden");
        assert_eq!(decision.message, "Request blocked for security reasons");
    }

    #[test]
    fn component_stream_in_accept_list_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html, TEXT/X-COMPONENT;q=0.9"),
        );
        assert!(guard().check(&headers, &uri("/")).is_some());
    }

    #[test]
    fn server_action_header_is_blocked_regardless_of_value() {
        let mut headers = HeaderMap::new();
        headers.insert("next-action", HeaderValue::from_static("abc123"));
        let decision = guard().check(&headers, &uri("/")).expect("blocked");
        assert_eq!(decision.message, "Request blocked for security reasons");
    }

    #[test]
    fn multipart_with_component_marker_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=text/x-component"),
        );
        assert!(guard().check(&headers, &uri("/")).is_some());
    }

    #[test]
    fn multipart_with_hostile_boundary_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary={injected}"),
        );
        assert!(guard().check(&headers, &uri("/")).is_some());
    }

    #[test]
    fn ordinary_multipart_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(
                "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxk",
            ),
        );
        assert_eq!(guard().check(&headers, &uri("/upload")), None);
    }

    #[test]
    fn url_pattern_is_blocked_with_pattern_message() {
        let headers = HeaderMap::new();
        let decision = guard()
            .check(&headers, &uri("/api/items?__proto__=1"))
            .expect("blocked");
        assert_eq!(decision.status, StatusCode::FORBIDDEN);
        assert_eq!(decision.message, "Request contains forbidden patterns");
    }

    #[test]
    fn url_pattern_match_is_case_insensitive() {
        let headers = HeaderMap::new();
        assert!(guard()
            .check(&headers, &uri("/lookup?q=PROCESS.ENV"))
            .is_some());
    }

    #[test]
    fn query_free_clean_url_passes() {
        assert_eq!(guard().check(&HeaderMap::new(), &uri("/healthz")), None);
    }
}
