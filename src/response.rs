//! Rejection-response body construction.

use crate::options::RateLimitOptions;
use serde_json::json;

/// Build the rejection body for the configured options.
///
/// With no template configured, the body is `{"message", "code", "status"}`.
/// A configured template has `$(ErrorMessage)` and `$(HttpStatusCode)`
/// substituted literally; the result is returned as-is, so the template
/// author controls the JSON shape.
pub fn rejection_body(options: &RateLimitOptions) -> String {
    match &options.response_template {
        Some(template) => template
            .replace("$(ErrorMessage)", &options.error_message)
            .replace("$(HttpStatusCode)", &options.http_status_code.to_string()),
        None => json!({
            "message": options.error_message,
            "code": options.http_status_code,
            "status": reason_phrase(options.http_status_code),
        })
        .to_string(),
    }
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        403 => "Forbidden",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "",
    }
}
