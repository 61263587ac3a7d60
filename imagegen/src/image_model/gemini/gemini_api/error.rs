use thiserror::Error;

/// Non-2xx answers from the Gemini API. `details` holds the pretty-printed
/// error JSON, or the raw body if it wasn't JSON.
#[derive(Debug, Error)]
pub enum GeminiApiError {
    #[error("API Error (400): invalid request\nDetails: {details}")]
    InvalidRequest { details: String },

    #[error("API Error ({status}): authentication failed, check your API key\nDetails: {details}")]
    Authentication { status: u16, details: String },

    #[error("API Error (404): model or endpoint not found\nDetails: {details}")]
    NotFound { details: String },

    #[error("API Error (429): rate limit exceeded\nDetails: {details}")]
    RateLimit { details: String },

    #[error("API Error ({status}): server error\nDetails: {details}")]
    Server { status: u16, details: String },

    /// Catch-all for unexpected status codes
    #[error("API Error ({status})\nDetails: {details}")]
    Unexpected { status: u16, details: String },
}

impl GeminiApiError {
    pub fn from_response(status: u16, body: &str) -> Self {
        let details = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| body.to_string());

        match status {
            400 => Self::InvalidRequest { details },
            401 | 403 => Self::Authentication { status, details },
            404 => Self::NotFound { details },
            429 => Self::RateLimit { details },
            500..=599 => Self::Server { status, details },
            _ => Self::Unexpected { status, details },
        }
    }
}
