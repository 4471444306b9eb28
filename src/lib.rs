//! Core of a source-code documentation generator: a deterministic
//! repository scanner and a uniform LLM provider abstraction with
//! synchronous and streaming generation over heterogeneous backends.

pub mod config;
pub mod error;
pub mod language;
pub mod prompt;
pub mod provider;
pub mod scan;

pub use config::{Config, ProviderConfig, ProviderKind, RepositoryConfig, WatchConfig};
pub use error::ScrivenerError;
pub use provider::{
    Backend, ChunkStream, GenerationOverrides, GenerationResponse, Message, ModelDescriptor,
    Role, Usage,
};
pub use scan::{FileRecord, PatternSet, ScanOptions, scan, scan_records};
