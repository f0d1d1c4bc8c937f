//! Error types for the transcription API

use axum::http::StatusCode;
use std::fmt;

#[derive(Debug)]
pub enum ServiceError {
    /// Job id was never created
    NotFound(String),
    /// Caller declared a protocol version different from ours
    VersionMismatch { client: String, server: String },
    /// An injected capability (transcription, preference lookup,
    /// categorization) failed
    Capability(String),
    /// Missing or invalid configuration, e.g. an unset provider API key
    Config(String),
    /// HTTP request to an LLM provider failed
    Http(Box<reqwest::Error>),
    /// Failed to parse a JSON payload
    Json(serde_json::Error),
    Io(Box<std::io::Error>),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::VersionMismatch { .. } => StatusCode::UPGRADE_REQUIRED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(job_id) => write!(f, "Job {} not found", job_id),
            ServiceError::VersionMismatch { client, server } => write!(
                f,
                "Version mismatch: Client version {} does not match server version {}. Please refresh your application.",
                client, server
            ),
            ServiceError::Capability(msg) => write!(f, "{}", msg),
            ServiceError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServiceError::Http(err) => write!(f, "HTTP error: {}", err),
            ServiceError::Json(err) => write!(f, "JSON parse error: {}", err),
            ServiceError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Http(err) => Some(err.as_ref()),
            ServiceError::Json(err) => Some(err),
            ServiceError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Http(Box::new(err))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Json(err)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServiceError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ServiceError::NotFound("abc".to_string());
        assert_eq!(format!("{}", err), "Job abc not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_version_mismatch() {
        let err = ServiceError::VersionMismatch {
            client: "0.9.0".to_string(),
            server: "1.0.0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Client version 0.9.0"));
        assert!(msg.contains("server version 1.0.0"));
        assert_eq!(err.status_code(), StatusCode::UPGRADE_REQUIRED);
    }

    #[test]
    fn test_capability_message_is_verbatim() {
        let err = ServiceError::Capability("audio decoder crashed".to_string());
        assert_eq!(format!("{}", err), "audio decoder crashed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_config_error_display() {
        let err = ServiceError::Config("OPENAI_API_KEY not set in environment".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: OPENAI_API_KEY not set in environment"
        );
    }

    #[test]
    fn test_json_error_has_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ServiceError::from(json_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
