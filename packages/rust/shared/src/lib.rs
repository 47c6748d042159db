//! Shared types, error model, and configuration for the researcher.
//!
//! This crate is the foundation depended on by all other researcher crates.
//! It provides:
//! - [`ResearcherError`]: the unified error type
//! - Domain types ([`PipelineState`], [`ResultItem`], [`Source`], [`StageError`], [`Question`])
//! - Configuration ([`AppConfig`], config loading, API-key validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, PipelineConfig, SearchConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, read_api_key, validate_api_keys,
};
pub use error::{ResearcherError, Result};
pub use types::{
    MAX_QUESTION_CHARS, MIN_QUESTION_CHARS, Phase, PipelineState, QueryResults, Question,
    ResultItem, RunId, RunOutput, SearchHit, Source, Stage, StageError,
};
