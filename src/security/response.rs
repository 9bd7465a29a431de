//! Outbound response filtering.
//!
//! Any nested, database- or user-derived data is run through the scanner
//! before it is allowed into a response. Unsafe data is dropped and the
//! findings go to the operator log; the client only sees the absence of the
//! `data` field. Scan findings are never leaked to the request origin.

use serde::Serialize;
use serde_json::Value;

use crate::security::scanner::Scanner;

/// Envelope for gateway-originated JSON responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Build a response envelope, filtering `data` through the scanner.
pub fn build_safe_response(
    scanner: &Scanner,
    success: bool,
    message: Option<&str>,
    data: Option<Value>,
) -> ApiResponse {
    let data = data.and_then(|value| {
        let result = scanner.scan(&value);
        if result.is_safe {
            Some(value)
        } else {
            tracing::warn!(
                dangerous_keys = ?result.dangerous_keys,
                dangerous_values = ?result.dangerous_values,
                reason = ?result.reason,
                "Dropped unsafe data from outbound response"
            );
            metrics::counter!("gateway_response_data_dropped_total").increment(1);
            None
        }
    });

    ApiResponse {
        success,
        message: message.map(str::to_string),
        data,
    }
}
