pub mod ollama;
pub mod openai;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, ProviderKind, validate_temperature};
use crate::error::ScrivenerError;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Max response body size accepted from a backend (2MB).
pub(crate) const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Conversation roles. Closed set; roles need not alternate strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire form, lowercase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Capitalized label for flattened single-prompt framing.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One conversation message. Owned by the caller for the duration of a
/// generation request; never mutated by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call parameter overrides. Call-time values win over the adapter's
/// configured defaults; the resolved values are validated before any
/// network call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOverrides {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Token accounting for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Build usage from backend-supplied counts. The total is always the
    /// sum of the two counts, never a combined field the backend reports;
    /// unknown counts contribute zero.
    pub fn from_counts(prompt: Option<u64>, completion: Option<u64>) -> Self {
        let prompt_tokens = prompt.unwrap_or(0);
        let completion_tokens = completion.unwrap_or(0);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Normalized response envelope. Immutable once constructed; a value,
/// not a live handle.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    /// Model identifier actually used.
    pub model: String,
    pub usage: Usage,
    /// Backend-specific completion tag, e.g. "stop" or "length".
    pub finish_reason: Option<String>,
    /// Raw backend payload, retained for diagnostics.
    pub raw: serde_json::Value,
}

/// Minimal descriptor from best-effort model enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
}

/// Lazy, finite, non-restartable sequence of generated text chunks.
/// Chunks arrive in backend transmission order; dropping the stream early
/// releases the underlying connection.
pub type ChunkStream = BoxStream<'static, Result<String, ScrivenerError>>;

/// Generation parameters after override resolution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Resolve per-call overrides against configured defaults and validate
/// the result. Fails fast before any HTTP request is issued.
pub(crate) fn resolve_params(
    config: &ProviderConfig,
    overrides: &GenerationOverrides,
) -> Result<ResolvedParams, ScrivenerError> {
    let temperature = overrides.temperature.unwrap_or(config.temperature);
    validate_temperature(temperature)?;

    let max_tokens = overrides.max_tokens.unwrap_or(config.max_tokens);
    if max_tokens == 0 {
        return Err(ScrivenerError::config("max_tokens", max_tokens, "> 0"));
    }

    Ok(ResolvedParams {
        temperature,
        max_tokens,
    })
}

/// Triage a response status before consuming the body. Non-2xx becomes an
/// upstream error with the status and a capped error-body excerpt.
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, ScrivenerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Cap error body reads to MAX_RESPONSE_BYTES to prevent memory exhaustion.
    let error_bytes = response.bytes().await.unwrap_or_default();
    let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
    let text = String::from_utf8_lossy(truncated);
    Err(ScrivenerError::Upstream {
        provider: provider.to_string(),
        message: format!("{status}: {text}"),
        status: Some(status.as_u16()),
    })
}

/// Read a complete JSON body with size enforcement, after status triage.
pub(crate) async fn read_json_body(
    response: reqwest::Response,
    provider: &str,
) -> Result<serde_json::Value, ScrivenerError> {
    let response = check_status(response, provider).await?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ScrivenerError::Upstream {
            provider: provider.to_string(),
            message: format!("failed to read response body: {e}"),
            status: None,
        })?;

    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(ScrivenerError::Upstream {
            provider: provider.to_string(),
            message: format!(
                "response too large: {} bytes (max {})",
                bytes.len(),
                MAX_RESPONSE_BYTES
            ),
            status: None,
        });
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| ScrivenerError::SchemaParse(format!("failed to parse response: {e}")))
}

/// The uniform provider contract over heterogeneous backends, as a closed
/// tagged variant selected by the configured provider at construction.
/// An instance is immutable after construction and safe for concurrent
/// calls; each call owns its own connection or response stream.
#[derive(Debug)]
pub enum Backend {
    OpenAi(OpenAiBackend),
    Ollama(OllamaBackend),
}

impl Backend {
    /// Validate the configuration and construct the selected adapter.
    /// Missing required fields (e.g. the OpenAI API key) fail here, before
    /// any network I/O.
    pub fn from_config(config: ProviderConfig) -> Result<Self, ScrivenerError> {
        config.validate()?;
        match config.provider {
            ProviderKind::OpenAi => Ok(Self::OpenAi(OpenAiBackend::new(config)?)),
            ProviderKind::Ollama => Ok(Self::Ollama(OllamaBackend::new(config)?)),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Ollama(_) => ProviderKind::Ollama,
        }
    }

    /// One blocking request/response round trip, no internal retries.
    pub async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<GenerationResponse, ScrivenerError> {
        match self {
            Self::OpenAi(backend) => backend.generate(messages, system_prompt, overrides).await,
            Self::Ollama(backend) => backend.generate(messages, system_prompt, overrides).await,
        }
    }

    /// Streaming generation; see [`ChunkStream`] for delivery guarantees.
    pub async fn generate_streaming(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<ChunkStream, ScrivenerError> {
        match self {
            Self::OpenAi(backend) => {
                backend
                    .generate_streaming(messages, system_prompt, overrides)
                    .await
            }
            Self::Ollama(backend) => {
                backend
                    .generate_streaming(messages, system_prompt, overrides)
                    .await
            }
        }
    }

    /// Best-effort model enumeration. Backends without an enumeration
    /// endpoint return [`ScrivenerError::Unsupported`], distinct from a
    /// network failure.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ScrivenerError> {
        match self {
            Self::OpenAi(backend) => backend.list_models().await,
            Self::Ollama(backend) => backend.list_models().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_is_sum_of_counts() {
        let usage = Usage::from_counts(Some(10), Some(5));
        assert_eq!(usage.total_tokens, 15);
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
    }

    #[test]
    fn usage_unknown_counts_are_zero() {
        assert_eq!(Usage::from_counts(None, None), Usage::default());
        assert_eq!(Usage::from_counts(Some(7), None).total_tokens, 7);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = ProviderConfig {
            temperature: 0.3,
            max_tokens: 4000,
            ..ProviderConfig::default()
        };
        let overrides = GenerationOverrides {
            temperature: Some(1.5),
            max_tokens: Some(128),
        };
        let resolved = resolve_params(&config, &overrides).unwrap();
        assert_eq!(resolved.temperature, 1.5);
        assert_eq!(resolved.max_tokens, 128);
    }

    #[test]
    fn absent_overrides_fall_back_to_config() {
        let config = ProviderConfig::default();
        let resolved = resolve_params(&config, &GenerationOverrides::default()).unwrap();
        assert_eq!(resolved.temperature, config.temperature);
        assert_eq!(resolved.max_tokens, config.max_tokens);
    }

    #[test]
    fn out_of_range_override_rejected() {
        let config = ProviderConfig::default();
        let overrides = GenerationOverrides {
            temperature: Some(2.5),
            max_tokens: None,
        };
        let err = resolve_params(&config, &overrides).unwrap_err();
        assert!(matches!(err, ScrivenerError::Config { .. }));
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::System.label(), "System");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.label(), "Assistant");
    }
}
