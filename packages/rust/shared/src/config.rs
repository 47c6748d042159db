//! Application configuration for the researcher.
//!
//! User config lives at `~/.researcher/researcher.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ResearcherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "researcher.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".researcher";

// ---------------------------------------------------------------------------
// Config structs (matching researcher.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Search-provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Prompt shaping for the pipeline stages.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Chat model used by every stage.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub planner_temperature: f32,

    #[serde(default)]
    pub analyst_temperature: f32,

    #[serde(default = "default_writer_temperature")]
    pub writer_temperature: f32,

    /// Per-request HTTP timeout for model calls.
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            planner_temperature: 0.0,
            analyst_temperature: 0.0,
            writer_temperature: default_writer_temperature(),
            request_timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_writer_temperature() -> f32 {
    0.3
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Base URL of the Tavily API.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results_per_query: usize,

    /// Tavily search depth: "basic" or "advanced".
    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    /// Independent timeout applied to each query.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Worker-pool size for concurrent queries.
    #[serde(default = "default_search_concurrency")]
    pub concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            max_results_per_query: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout(),
            concurrency: default_search_concurrency(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    3
}
fn default_search_depth() -> String {
    "basic".into()
}
fn default_search_timeout() -> u64 {
    30
}
fn default_search_concurrency() -> usize {
    5
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Characters of each result excerpt placed in the analysis prompt.
    #[serde(default = "default_content_truncate")]
    pub content_truncate_length: usize,

    /// Characters of each result excerpt placed in the answer prompt.
    #[serde(default = "default_answer_truncate")]
    pub answer_truncate_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            content_truncate_length: default_content_truncate(),
            answer_truncate_length: default_answer_truncate(),
        }
    }
}

fn default_content_truncate() -> usize {
    300
}
fn default_answer_truncate() -> usize {
    200
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.researcher/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ResearcherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.researcher/researcher.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ResearcherError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ResearcherError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ResearcherError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| ResearcherError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ResearcherError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty API key from the named env var.
pub fn read_api_key(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// Check that both collaborator API keys are present.
///
/// Every missing variable is listed in one error so the user can fix them all at once.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    let missing: Vec<&str> = [&config.llm.api_key_env, &config.search.api_key_env]
        .into_iter()
        .filter(|var| read_api_key(var).is_none())
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(ResearcherError::config(format!(
        "missing API keys: {}. Set them in the environment or a .env file.",
        missing.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("TAVILY_API_KEY"));
        assert!(toml_str.contains("max_results_per_query"));
    }

    #[test]
    fn config_roundtrip() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.search.timeout_secs, 30);
        assert_eq!(parsed.search.concurrency, 5);
        assert_eq!(parsed.llm.model, "gpt-4o");
        assert!((parsed.llm.writer_temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[llm]
model = "gpt-4o-mini"

[pipeline]
content_truncate_length = 500
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.content_truncate_length, 500);
        assert_eq!(config.pipeline.answer_truncate_length, 200);
        assert_eq!(config.search.max_results_per_query, 3);
    }

    #[test]
    fn api_key_validation_lists_all_missing() {
        let mut config = AppConfig::default();
        // Unique env var names to avoid interfering with other tests
        config.llm.api_key_env = "RS_TEST_NONEXISTENT_LLM_KEY_12345".into();
        config.search.api_key_env = "RS_TEST_NONEXISTENT_SEARCH_KEY_12345".into();

        let err = validate_api_keys(&config).unwrap_err().to_string();
        assert!(err.contains("RS_TEST_NONEXISTENT_LLM_KEY_12345"));
        assert!(err.contains("RS_TEST_NONEXISTENT_SEARCH_KEY_12345"));
    }
}
