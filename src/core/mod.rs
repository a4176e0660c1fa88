pub mod middleware;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl GoogleErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!(
                "{} ({}, code: {})",
                self.error.message, status, self.error.code
            ),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Turns a failed Google API response into a readable message.
///
/// Falls back to `"{context}: {status}"` when the body is not the standard error envelope.
pub async fn parse_error_response(response: reqwest::Response, context: &str) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<GoogleErrorResponse>(&text) {
        Ok(error_resp) => format!("{}: {}", context, error_resp.display_message()),
        Err(_) if text.is_empty() => format!("{}: {}", context, status),
        Err(_) => format!("{} {}: {}", context, status, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_message_includes_status_when_present() {
        let resp: GoogleErrorResponse = serde_json::from_str(
            r#"{"error":{"code":403,"message":"Missing permissions","status":"PERMISSION_DENIED"}}"#,
        )
        .unwrap();
        assert_eq!(
            resp.display_message(),
            "Missing permissions (PERMISSION_DENIED, code: 403)"
        );
    }

    #[test]
    fn display_message_without_status() {
        let resp: GoogleErrorResponse =
            serde_json::from_str(r#"{"error":{"code":500,"message":"boom"}}"#).unwrap();
        assert_eq!(resp.display_message(), "boom (code: 500)");
    }
}
