//! Error types for the Outscale provider.

use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the Outscale provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OutscaleError {
    /// Raised when the configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the HTTP request itself fails (connect, TLS, timeout).
    #[error("transport error: {message}")]
    Http {
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("provider error: {message}")]
    Provider {
        /// Message extracted from the API error body.
        message: String,
    },
    /// Raised when a lookup matched no resource.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind, e.g. `vm` or `volume`.
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode provider response: {message}")]
    Decode {
        /// Message from the decoder.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "Type", default)]
    kind: Option<String>,
    #[serde(rename = "Details", default)]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Errors", default)]
    errors: Vec<ApiErrorDetail>,
}

/// Extracts a readable message from an API error body, falling back to the
/// raw body when it is not the documented JSON shape.
#[must_use]
pub(super) fn api_error_message(status: u16, body: &str) -> String {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let details = parsed.and_then(|envelope| {
        let rendered: Vec<String> = envelope
            .errors
            .iter()
            .map(|error| {
                match (error.kind.as_deref(), error.details.as_deref()) {
                    (Some(kind), Some(detail)) => format!("{kind}: {detail}"),
                    (Some(kind), None) => kind.to_owned(),
                    (None, Some(detail)) => detail.to_owned(),
                    (None, None) => String::from("unspecified error"),
                }
            })
            .collect();
        if rendered.is_empty() {
            None
        } else {
            Some(rendered.join("; "))
        }
    });
    details.map_or_else(
        || format!("HTTP {status}: {}", body.trim()),
        |message| format!("HTTP {status}: {message}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_structured_api_errors() {
        let body = r#"{"Errors":[{"Type":"InvalidResource","Details":"vm not found"}]}"#;
        assert_eq!(
            api_error_message(409, body),
            "HTTP 409: InvalidResource: vm not found"
        );
    }

    #[test]
    fn falls_back_to_the_raw_body() {
        assert_eq!(
            api_error_message(500, "internal error\n"),
            "HTTP 500: internal error"
        );
    }
}
