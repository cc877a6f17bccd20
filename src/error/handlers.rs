//! Standardized error handling for HTTP responses and network failures

use crate::error::IibPushError;
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle IIB API errors with standardized messages
    pub fn handle_iib_error(status: StatusCode, error_text: &str, operation: &str) -> IibPushError {
        let error_text = Self::extract_error_message(error_text);
        let error_msg = match status.as_u16() {
            400 => format!("IIB rejected the {} request: {}", operation, error_text),
            401 => format!(
                "Unauthorized to perform {} - check the Kerberos ticket: {}",
                operation, error_text
            ),
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            500 => format!("IIB server error during {}: {}", operation, error_text),
            502 | 503 => format!("IIB unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        IibPushError::Iib(error_msg)
    }

    /// Handle Pulp API errors
    pub fn handle_pulp_error(status: StatusCode, error_text: &str, operation: &str) -> IibPushError {
        let error_msg = match status.as_u16() {
            401 => format!("Invalid Pulp credentials for {}", operation),
            403 => format!("Access denied to Pulp for {}", operation),
            404 => format!("Pulp resource not found for {}: {}", operation, error_text),
            500 => format!("Pulp server error during {}: {}", operation, error_text),
            502 | 503 => format!("Pulp unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        IibPushError::Pulp(error_msg)
    }

    /// IIB answers errors as `{"error": "..."}`; fall back to the raw body.
    fn extract_error_message(error_text: &str) -> String {
        serde_json::from_str::<serde_json::Value>(error_text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| error_text.to_string())
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> IibPushError {
        if error.is_timeout() {
            IibPushError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            IibPushError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.is_decode() {
            IibPushError::Parse(format!("Invalid response body for {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            IibPushError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            IibPushError::Network(format!("{} network error: {}", context, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iib_error_uses_json_error_field() {
        let err = HttpErrorHandler::handle_iib_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": "\"bundles\" should be a non-empty array"}"#,
            "add bundles",
        );
        assert_eq!(
            err.to_string(),
            "IIB error: IIB rejected the add bundles request: \"bundles\" should be a non-empty array"
        );
    }

    #[test]
    fn test_iib_error_falls_back_to_raw_body() {
        let err = HttpErrorHandler::handle_iib_error(
            StatusCode::IM_A_TEAPOT,
            "teapot",
            "get build",
        );
        assert!(err.to_string().contains("get build failed (status 418"));
        assert!(err.to_string().ends_with("teapot"));
    }

    #[test]
    fn test_pulp_not_found() {
        let err = HttpErrorHandler::handle_pulp_error(
            StatusCode::NOT_FOUND,
            "missing",
            "get repository redhat-operator-index",
        );
        assert!(matches!(err, IibPushError::Pulp(_)));
        assert!(err.to_string().contains("not found"));
    }
}
