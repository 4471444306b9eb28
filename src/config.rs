use serde::Deserialize;

use crate::error::ScrivenerError;

/// Supported LLM backends. Closed set: the provider enum selects the
/// adapter variant at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// LLM provider configuration. Constructed once per run, validated eagerly,
/// then held immutably by a backend adapter for its whole lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    /// Model identifier. None resolves to the adapter-specific default.
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Custom API base URL. None resolves to the adapter-specific default.
    pub base_url: Option<String>,
    /// Sampling temperature, must lie in [0.0, 2.0].
    pub temperature: f64,
    /// Maximum tokens in the response, must be positive.
    pub max_tokens: u32,
    /// Request timeout in seconds, must be positive.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: None,
            api_key: None,
            base_url: None,
            temperature: 0.3,
            max_tokens: 4000,
            timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    /// Validate bounds. Runs before any network I/O is attempted.
    pub fn validate(&self) -> Result<(), ScrivenerError> {
        validate_temperature(self.temperature)?;
        if self.max_tokens == 0 {
            return Err(ScrivenerError::config("max_tokens", self.max_tokens, "> 0"));
        }
        if self.timeout_secs == 0 {
            return Err(ScrivenerError::config(
                "timeout_secs",
                self.timeout_secs,
                "> 0",
            ));
        }
        Ok(())
    }
}

/// Validate a sampling temperature: finite and within [0.0, 2.0].
/// Shared between eager config validation and per-call override resolution.
pub fn validate_temperature(temp: f64) -> Result<(), ScrivenerError> {
    if temp.is_nan() || temp.is_infinite() || !(0.0..=2.0).contains(&temp) {
        return Err(ScrivenerError::config("temperature", temp, "0.0..=2.0"));
    }
    Ok(())
}

/// Repository scanning configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub path: String,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Maximum file size in bytes. Files strictly larger are skipped.
    pub max_file_size: u64,
    pub follow_symlinks: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            include_patterns: default_include_patterns(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: 1_048_576, // 1 MiB
            follow_symlinks: false,
        }
    }
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<(), ScrivenerError> {
        if self.max_file_size == 0 {
            return Err(ScrivenerError::config(
                "max_file_size",
                self.max_file_size,
                "> 0",
            ));
        }
        Ok(())
    }
}

fn default_include_patterns() -> Vec<String> {
    [
        "*.py", "*.js", "*.ts", "*.jsx", "*.tsx", "*.java", "*.go", "*.rs", "*.cpp", "*.c",
        "*.h", "*.cs", "*.rb", "*.php", "*.swift", "*.kt", "*.scala", "*.r",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "*.pyc",
        "__pycache__",
        "node_modules",
        ".git",
        "*.egg-info",
        "dist",
        "build",
        ".venv",
        "venv",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// File-watch configuration contract. The debounce scheduler itself lives
/// outside this crate; only the parameters it accepts are specified here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    /// Debounce interval in seconds. Bounded to [0.1, 60.0].
    pub debounce_seconds: f64,
    pub batch_changes: bool,
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_seconds: 2.0,
            batch_changes: true,
            recursive: true,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), ScrivenerError> {
        let d = self.debounce_seconds;
        if d.is_nan() || !(0.1..=60.0).contains(&d) {
            return Err(ScrivenerError::config("debounce_seconds", d, "0.1..=60.0"));
        }
        Ok(())
    }
}

/// Root configuration consumed by callers. Loading and merging of config
/// sources is a collaborator concern; this is only the validated schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: ProviderConfig,
    pub repository: RepositoryConfig,
    pub watch: WatchConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ScrivenerError> {
        self.llm.validate()?;
        self.repository.validate()?;
        self.watch.validate()?;
        Ok(())
    }
}
