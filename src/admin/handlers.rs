use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::http::server::AppState;
use crate::security::build_safe_response;

/// Gateway status for operators.
///
/// The payload goes through the safe-response path like any other derived
/// data, so even status output cannot smuggle dangerous content out.
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "upstream": state.config.upstream.address,
        "guard_enabled": state.config.guard.enabled,
        // Not named after the config key: "_response" is itself a
        // registry-listed fragment and would be dropped by the filter below.
        "filters_upstream_json": state.config.scanner.scan_responses,
        "registry": {
            "dangerous_keys": state.scanner.patterns().key_count(),
            "value_patterns": state.scanner.patterns().value_pattern_count(),
        },
    });

    Json(build_safe_response(&state.scanner, true, None, Some(status)))
}
