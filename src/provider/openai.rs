use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::Client;

use crate::config::ProviderConfig;
use crate::error::ScrivenerError;
use crate::provider::{
    ChunkStream, GenerationOverrides, GenerationResponse, Message, ModelDescriptor,
    ResolvedParams, Role, Usage, check_status, read_json_body, resolve_params,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "openai";

/// Chat-completions backend adapter. Accepts a structured message list,
/// so an out-of-band system prompt becomes a leading system-role message.
/// Requires an API key at construction.
#[derive(Debug)]
pub struct OpenAiBackend {
    client: Client,
    config: ProviderConfig,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(config: ProviderConfig) -> Result<Self, ScrivenerError> {
        config.validate()?;

        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScrivenerError::config("api_key", "<missing>", "required for openai"))?;

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            config,
        })
    }

    /// Resolved API root, e.g. `https://api.openai.com/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolved model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        stream: bool,
        params: &ResolvedParams,
    ) -> serde_json::Value {
        let mut payload = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            payload.push(serde_json::json!({
                "role": Role::System.as_str(),
                "content": system,
            }));
        }
        for msg in messages {
            payload.push(serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": payload,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": stream,
        })
    }

    /// One non-streaming chat-completions round trip.
    pub async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<GenerationResponse, ScrivenerError> {
        let params = resolve_params(&self.config, overrides)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&self.request_body(messages, system_prompt, false, &params))
            .send()
            .await?;

        let raw = read_json_body(response, PROVIDER).await?;

        let text = raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrivenerError::Upstream {
                provider: PROVIDER.to_string(),
                message: "empty choices or null content".to_string(),
                status: None,
            })?;

        let usage = Usage::from_counts(
            raw["usage"]["prompt_tokens"].as_u64(),
            raw["usage"]["completion_tokens"].as_u64(),
        );
        let finish_reason = raw["choices"][0]["finish_reason"]
            .as_str()
            .map(str::to_string);
        let model = raw["model"].as_str().unwrap_or(&self.model).to_string();

        Ok(GenerationResponse {
            text,
            model,
            usage,
            finish_reason,
            raw,
        })
    }

    /// Streaming generation over SSE. Yields `choices[0].delta.content` of
    /// each data event that carries one and terminates on the `[DONE]`
    /// sentinel. Dropping the stream early releases the connection.
    pub async fn generate_streaming(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<ChunkStream, ScrivenerError> {
        let params = resolve_params(&self.config, overrides)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&self.request_body(messages, system_prompt, true, &params))
            .send()
            .await?;

        let response = check_status(response, PROVIDER).await?;
        let events = response.bytes_stream().eventsource().boxed();

        Ok(Box::pin(stream::try_unfold(events, |mut events| async move {
            loop {
                match events.next().await {
                    None => return Ok(None),
                    Some(Err(e)) => {
                        return Err(ScrivenerError::SchemaParse(format!(
                            "failed to parse event stream: {e}"
                        )));
                    }
                    Some(Ok(event)) => {
                        if event.data.trim() == "[DONE]" {
                            return Ok(None);
                        }
                        let value: serde_json::Value =
                            serde_json::from_str(&event.data).map_err(|e| {
                                ScrivenerError::SchemaParse(format!(
                                    "failed to parse stream event: {e}"
                                ))
                            })?;
                        // Events without content (role preamble, finish
                        // chunk) are skipped.
                        if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
                            return Ok(Some((delta.to_string(), events)));
                        }
                    }
                }
            }
        })))
    }

    /// Best-effort enumeration via the models endpoint.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ScrivenerError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let raw = read_json_body(response, PROVIDER).await?;

        let models = match raw["data"].as_array() {
            Some(entries) => entries
                .iter()
                .filter_map(|entry| {
                    entry["id"].as_str().map(|id| ModelDescriptor {
                        name: id.to_string(),
                    })
                })
                .collect(),
            None => {
                tracing::warn!("models response missing 'data' field, returning empty list");
                Vec::new()
            }
        };
        Ok(models)
    }
}
