use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Cli;
use crate::cli::art::ArtStyle;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_WEB_SEARCH_URL: &str = "https://api.tavily.com";
pub const CONFIG_ENV: &str = "TASSIST_CONFIG";

/// Model catalog offered by the selection menu when the config file has none.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemma3:1b",
    "gemma3:4b",
    "mistral:7b",
    "llama3.1:8b",
    "qwen3:8b",
    "qwen3:14b",
];

/// Models that stream a hidden reasoning preamble before the visible answer.
const REASONING_MODELS: &[&str] = &["qwen3:8b", "qwen3:14b"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    /// Preselected model; the selection menu is skipped when this is set.
    pub model: Option<String>,
    pub offline: Option<bool>,
    pub models: Vec<String>,
    pub terminal: Vec<String>,
    pub tool_results: ToolResultPolicy,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub output_filters: HashMap<String, OutputFilterPolicy>,
    pub web_search_api_key: Option<String>,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: None,
            offline: None,
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            terminal: vec!["konsole".to_string(), "-e".to_string()],
            tool_results: ToolResultPolicy::default(),
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
            output_filters: default_output_filters(),
            web_search_api_key: None,
            log_level: "info".to_string(),
            log_file: default_log_file(),
        }
    }
}

/// What happens to tool results when one stream announces several tool calls.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultPolicy {
    /// Every result becomes its own tool message.
    #[default]
    All,
    /// Only the last result is kept.
    Last,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub probe_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            connect_timeout_ms: 5_000,
            max_retries: 0,
            retry_base_ms: 500,
            retry_jitter_ms: 250,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub find_timeout_secs: u64,
    pub web_search_url: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            find_timeout_secs: 30,
            web_search_url: DEFAULT_WEB_SEARCH_URL.to_string(),
        }
    }
}

/// Per-model rule for hiding reasoning output from the visible stream.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OutputFilterPolicy {
    #[serde(default)]
    pub suppress_leading_chunks: usize,
    #[serde(default)]
    pub suppress_tokens: Vec<String>,
}

impl OutputFilterPolicy {
    pub fn is_passthrough(&self) -> bool {
        self.suppress_leading_chunks == 0 && self.suppress_tokens.is_empty()
    }
}

pub fn default_output_filters() -> HashMap<String, OutputFilterPolicy> {
    REASONING_MODELS
        .iter()
        .map(|model| {
            (
                model.to_string(),
                OutputFilterPolicy {
                    suppress_leading_chunks: 4,
                    suppress_tokens: vec!["<think>".to_string(), "</think>".to_string()],
                },
            )
        })
        .collect()
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("term-assist")
        .join("debug.log")
}

/// Everything fixed for one dispatcher binding. `chmodel` builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub offline: bool,
    pub art: ArtStyle,
    pub base_url: String,
}

impl SessionConfig {
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub offline: Option<bool>,
    pub models: Option<Vec<String>>,
    pub terminal: Option<Vec<String>>,
    pub tool_results: Option<ToolResultPolicy>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub llm: Option<PartialLlmConfig>,
    pub tools: Option<PartialToolsConfig>,
    // Merged over the built-in reasoning-model filters, keyed by model name
    pub output_filters: Option<HashMap<String, OutputFilterPolicy>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialLlmConfig {
    pub probe_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub retry_jitter_ms: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialToolsConfig {
    pub find_timeout_secs: Option<u64>,
    pub web_search_url: Option<String>,
}

/// Values picked up from the process environment (and `.env`).
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub log_level: Option<String>,
    pub web_search_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            base_url: non_empty("OLLAMA_HOST").map(|h| normalize_host(&h)),
            model: non_empty("TASSIST_MODEL"),
            log_level: non_empty("TASSIST_LOG"),
            web_search_api_key: non_empty("TAVILY_API_KEY"),
        }
    }
}

// OLLAMA_HOST is commonly given without a scheme ("127.0.0.1:11434")
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file_cfg = match &cli.config {
            Some(path) => load_config_at(path)?,
            None => load_file_config().unwrap_or_default(),
        };
        Ok(Self::merge(cli, EnvOverrides::from_env(), file_cfg))
    }

    /// CLI flags win over the environment, which wins over the config file.
    pub fn merge(cli: &Cli, env: EnvOverrides, file_cfg: FileConfig) -> Self {
        let defaults = Self::default();

        let base_url = cli
            .base_url
            .clone()
            .or(env.base_url)
            .or(file_cfg.base_url)
            .unwrap_or(defaults.base_url);
        let model = cli.model.clone().or(env.model).or(file_cfg.model);
        let offline = if cli.offline {
            Some(true)
        } else {
            file_cfg.offline
        };

        let models = file_cfg
            .models
            .filter(|m| !m.is_empty())
            .unwrap_or(defaults.models);
        let terminal = file_cfg
            .terminal
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.terminal);

        let llm = match file_cfg.llm {
            Some(p) => LlmConfig {
                probe_timeout_ms: p.probe_timeout_ms.unwrap_or(defaults.llm.probe_timeout_ms),
                connect_timeout_ms: p
                    .connect_timeout_ms
                    .unwrap_or(defaults.llm.connect_timeout_ms),
                max_retries: p.max_retries.unwrap_or(defaults.llm.max_retries),
                retry_base_ms: p.retry_base_ms.unwrap_or(defaults.llm.retry_base_ms),
                retry_jitter_ms: p.retry_jitter_ms.unwrap_or(defaults.llm.retry_jitter_ms),
                temperature: p.temperature.unwrap_or(defaults.llm.temperature),
            },
            None => defaults.llm,
        };

        let tools = match file_cfg.tools {
            Some(p) => ToolsConfig {
                find_timeout_secs: p
                    .find_timeout_secs
                    .unwrap_or(defaults.tools.find_timeout_secs),
                web_search_url: p.web_search_url.unwrap_or(defaults.tools.web_search_url),
            },
            None => defaults.tools,
        };

        let mut output_filters = defaults.output_filters;
        if let Some(overrides) = file_cfg.output_filters {
            for (model, policy) in overrides {
                output_filters.insert(model, policy);
            }
        }

        let log_level = cli
            .log_level
            .clone()
            .or(env.log_level)
            .or(file_cfg.log_level)
            .unwrap_or(defaults.log_level);
        let log_file = cli
            .log_file
            .clone()
            .or(file_cfg.log_file)
            .unwrap_or(defaults.log_file);

        Self {
            base_url,
            model,
            offline,
            models,
            terminal,
            tool_results: file_cfg.tool_results.unwrap_or_default(),
            llm,
            tools,
            output_filters,
            web_search_api_key: env.web_search_api_key,
            log_level,
            log_file,
        }
    }

    /// Filter policy for `model`; models without an entry stream unfiltered.
    pub fn output_filter_for(&self, model: &str) -> OutputFilterPolicy {
        self.output_filters.get(model).cloned().unwrap_or_default()
    }
}

pub fn load_file_config() -> Result<FileConfig> {
    fn candidate_paths() -> Vec<PathBuf> {
        let mut v = Vec::new();
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            v.push(PathBuf::from(p));
        }
        if let Some(dir) = dirs::config_dir() {
            v.push(dir.join("term-assist/config.toml"));
        }
        v
    }

    for p in candidate_paths() {
        if p.exists() {
            let s = fs::read_to_string(&p)
                .with_context(|| format!("read config file: {}", p.display()))?;
            match toml::from_str::<FileConfig>(&s) {
                Ok(cfg) => {
                    info!(path=%p.display(), "loaded config file");
                    return Ok(cfg);
                }
                Err(e) => {
                    warn!(path=%p.display(), error=%e.to_string(), "parse config failed");
                    continue;
                }
            }
        }
    }
    Ok(FileConfig::default())
}

/// Load an explicitly requested config file. Unlike the search path, a missing
/// or malformed file here is an error.
pub fn load_config_at(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    let cfg = toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("parse config file: {}", path.display()))?;
    info!(path=%path.display(), "loaded config file");
    Ok(cfg)
}

#[cfg(test)]
mod tests;
