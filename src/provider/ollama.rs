use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::Client;

use crate::config::ProviderConfig;
use crate::error::ScrivenerError;
use crate::prompt;
use crate::provider::{
    ChunkStream, GenerationOverrides, GenerationResponse, Message, ModelDescriptor,
    ResolvedParams, Usage, check_status, read_json_body, resolve_params,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama2";

const PROVIDER: &str = "ollama";

/// Timeout for the lightweight tags endpoint, independent of the
/// generation timeout.
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Local-inference backend adapter. Exposes a single flattened prompt
/// rather than a structured message list, so conversations go through
/// [`prompt::flatten`]. Base URL and model resolve to the defaults above
/// when the configuration leaves them unset.
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    config: ProviderConfig,
    api_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(config: ProviderConfig) -> Result<Self, ScrivenerError> {
        config.validate()?;

        let base = config
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
            api_url: format!("{base}/api"),
            model,
            config,
        })
    }

    /// Resolved API root, e.g. `http://localhost:11434/api`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Resolved model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, stream: bool, params: &ResolvedParams) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": stream,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            }
        })
    }

    /// One non-streaming round trip: single POST, single JSON object back.
    pub async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<GenerationResponse, ScrivenerError> {
        let params = resolve_params(&self.config, overrides)?;
        let prompt = prompt::flatten(messages, system_prompt);

        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&self.request_body(&prompt, false, &params))
            .send()
            .await?;

        let raw = read_json_body(response, PROVIDER).await?;

        let text = raw["response"].as_str().unwrap_or("").to_string();
        // Token totals are summed from the two counts; the backend offers
        // no combined field to trust.
        let usage = Usage::from_counts(
            raw["prompt_eval_count"].as_u64(),
            raw["eval_count"].as_u64(),
        );
        let finish_reason = raw["done_reason"].as_str().map(str::to_string);
        let model = raw["model"]
            .as_str()
            .unwrap_or(&self.model)
            .to_string();

        Ok(GenerationResponse {
            text,
            model,
            usage,
            finish_reason,
            raw,
        })
    }

    /// Streaming generation: the same POST with `stream=true`, yielding the
    /// `response` text of each newline-delimited JSON object as it arrives.
    /// Objects without a text payload (such as the terminal metadata
    /// object) are skipped without special-casing.
    pub async fn generate_streaming(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        overrides: &GenerationOverrides,
    ) -> Result<ChunkStream, ScrivenerError> {
        let params = resolve_params(&self.config, overrides)?;
        let prompt = prompt::flatten(messages, system_prompt);

        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&self.request_body(&prompt, true, &params))
            .send()
            .await?;

        let response = check_status(response, PROVIDER).await?;
        Ok(ndjson_chunks(response.bytes_stream().boxed()))
    }

    /// Best-effort enumeration via the tags endpoint. A missing `models`
    /// field degrades to an empty list rather than an error.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ScrivenerError> {
        let response = self
            .client
            .get(format!("{}/tags", self.api_url))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await?;

        let raw = read_json_body(response, PROVIDER).await?;

        let models = match raw["models"].as_array() {
            Some(entries) => entries
                .iter()
                .filter_map(|entry| {
                    entry["name"].as_str().map(|name| ModelDescriptor {
                        name: name.to_string(),
                    })
                })
                .collect(),
            None => {
                tracing::warn!("tags response missing 'models' field, returning empty list");
                Vec::new()
            }
        };
        Ok(models)
    }
}

struct NdjsonState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buf: Vec<u8>,
    queue: VecDeque<String>,
    done: bool,
}

/// Adapt a raw byte stream of newline-delimited JSON into text chunks.
/// One object is parsed at a time; no buffering beyond line reassembly.
/// Dropping the returned stream drops the underlying response, releasing
/// the connection on every exit path including early abandonment.
fn ndjson_chunks(body: BoxStream<'static, reqwest::Result<Bytes>>) -> ChunkStream {
    let state = NdjsonState {
        body,
        buf: Vec::new(),
        queue: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                return Ok(Some((chunk, state)));
            }
            if state.done {
                return Ok(None);
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buf.extend_from_slice(&bytes);
                    while let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = state.buf.drain(..=pos).collect();
                        if let Some(text) = parse_line(&line)? {
                            state.queue.push_back(text);
                        }
                    }
                }
                Some(Err(e)) => return Err(ScrivenerError::from(e)),
                None => {
                    state.done = true;
                    // A final object without a trailing newline still counts.
                    if !state.buf.is_empty() {
                        let rest = std::mem::take(&mut state.buf);
                        if let Some(text) = parse_line(&rest)? {
                            state.queue.push_back(text);
                        }
                    }
                }
            }
        }
    }))
}

/// Parse one NDJSON line. Returns the `response` text when the object has
/// one; blank lines and objects lacking the key yield None. A line that
/// is not valid JSON is a malformed body.
fn parse_line(line: &[u8]) -> Result<Option<String>, ScrivenerError> {
    let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_slice(trimmed)
        .map_err(|e| ScrivenerError::SchemaParse(format!("failed to parse stream line: {e}")))?;

    Ok(value["response"].as_str().map(str::to_string))
}
