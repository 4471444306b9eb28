use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrivenerError {
    #[error("invalid configuration: {parameter} = {value} (allowed: {allowed})")]
    Config {
        parameter: String,
        value: String,
        allowed: String,
    },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("operation not supported by {provider}: {operation}")]
    Unsupported { provider: String, operation: String },

    #[error("scan error: {0}")]
    Scan(String),
}

impl ScrivenerError {
    /// Build a configuration error with an actionable message:
    /// parameter name, the offending value, and the allowed range.
    pub fn config(
        parameter: impl Into<String>,
        value: impl ToString,
        allowed: impl Into<String>,
    ) -> Self {
        Self::Config {
            parameter: parameter.into(),
            value: value.to_string(),
            allowed: allowed.into(),
        }
    }

    /// Extract provider name from variants that carry provider context.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Upstream { provider, .. } => Some(provider),
            Self::Unsupported { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Returns true for transient errors that may succeed on retry.
    /// Retry policy itself is a caller concern; this is only a hint.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => {
                // 5xx = server error (retryable), 4xx = client error (not retryable)
                // status: None = ambiguous (body read failed) → safe default: NOT retryable
                status.is_some_and(|s| s >= 500)
            }
            Self::Request(_) => true, // connection errors and timeouts may be transient
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_parameter_and_bounds() {
        let err = ScrivenerError::config("temperature", 2.5, "0.0..=2.0");
        let msg = err.to_string();
        assert!(msg.contains("temperature"));
        assert!(msg.contains("2.5"));
        assert!(msg.contains("0.0..=2.0"));
    }

    #[test]
    fn retryable_classification() {
        let server_err = ScrivenerError::Upstream {
            provider: "ollama".into(),
            message: "boom".into(),
            status: Some(503),
        };
        assert!(server_err.is_retryable());

        let client_err = ScrivenerError::Upstream {
            provider: "ollama".into(),
            message: "bad request".into(),
            status: Some(400),
        };
        assert!(!client_err.is_retryable());

        let config_err = ScrivenerError::config("max_tokens", 0, "> 0");
        assert!(!config_err.is_retryable());

        let unsupported = ScrivenerError::Unsupported {
            provider: "openai".into(),
            operation: "list_models".into(),
        };
        assert!(!unsupported.is_retryable());
    }

    #[test]
    fn provider_extraction() {
        let err = ScrivenerError::Unsupported {
            provider: "openai".into(),
            operation: "list_models".into(),
        };
        assert_eq!(err.provider(), Some("openai"));
        assert_eq!(ScrivenerError::Scan("x".into()).provider(), None);
    }
}
