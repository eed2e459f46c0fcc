use crate::Cli;
use crate::config::{
    AppConfig, EnvOverrides, FileConfig, OutputFilterPolicy, ToolResultPolicy, load_config_at,
};
use clap::Parser;
use std::fs;
use tempfile::TempDir;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["tassist"];
    argv.extend_from_slice(args);
    Cli::parse_from(argv)
}

#[test]
fn test_load_config_at() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let config_content = r#"
base_url = "http://gpu-box:11434"
model = "mistral:7b"
offline = true
tool_results = "last"

[llm]
probe_timeout_ms = 1500

[tools]
find_timeout_secs = 10

[output_filters."deepseek-r1:8b"]
suppress_leading_chunks = 2
suppress_tokens = ["<think>"]
"#;
    fs::write(&path, config_content).unwrap();

    let file_cfg = load_config_at(&path).unwrap();
    assert_eq!(file_cfg.base_url.as_deref(), Some("http://gpu-box:11434"));
    assert_eq!(file_cfg.model.as_deref(), Some("mistral:7b"));
    assert_eq!(file_cfg.offline, Some(true));
    assert_eq!(file_cfg.tool_results, Some(ToolResultPolicy::Last));
    assert_eq!(file_cfg.llm.unwrap().probe_timeout_ms, Some(1500));
    assert_eq!(file_cfg.tools.unwrap().find_timeout_secs, Some(10));
    let filters = file_cfg.output_filters.unwrap();
    assert_eq!(filters["deepseek-r1:8b"].suppress_leading_chunks, 2);
}

#[test]
fn test_load_config_at_rejects_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "model = [unterminated").unwrap();

    assert!(load_config_at(&path).is_err());
}

#[test]
fn test_defaults_filter_reasoning_models_only() {
    let cfg = AppConfig::merge(&cli(&[]), EnvOverrides::default(), FileConfig::default());

    assert_eq!(cfg.base_url, "http://localhost:11434");
    assert_eq!(cfg.models.len(), 6);
    assert_eq!(cfg.tools.find_timeout_secs, 30);
    assert_eq!(cfg.llm.temperature, 0.0);
    assert_eq!(cfg.tool_results, ToolResultPolicy::All);

    let qwen = cfg.output_filter_for("qwen3:14b");
    assert_eq!(qwen.suppress_leading_chunks, 4);
    assert_eq!(qwen.suppress_tokens, vec!["<think>", "</think>"]);
    assert!(cfg.output_filter_for("gemma3:1b").is_passthrough());
}

#[test]
fn test_precedence_cli_env_file() {
    let file_cfg = FileConfig {
        base_url: Some("http://from-file:11434".into()),
        model: Some("gemma3:1b".into()),
        log_level: Some("warn".into()),
        ..FileConfig::default()
    };
    let env = EnvOverrides {
        base_url: Some("http://from-env:11434".into()),
        model: Some("llama3.1:8b".into()),
        ..EnvOverrides::default()
    };

    let cfg = AppConfig::merge(&cli(&["--model", "qwen3:8b"]), env, file_cfg);

    assert_eq!(cfg.model.as_deref(), Some("qwen3:8b"));
    assert_eq!(cfg.base_url, "http://from-env:11434");
    assert_eq!(cfg.log_level, "warn");
}

#[test]
fn test_file_filters_merge_over_builtin() {
    let mut overrides = std::collections::HashMap::new();
    overrides.insert("qwen3:8b".to_string(), OutputFilterPolicy::default());
    overrides.insert(
        "deepseek-r1:8b".to_string(),
        OutputFilterPolicy {
            suppress_leading_chunks: 1,
            suppress_tokens: vec![],
        },
    );
    let file_cfg = FileConfig {
        output_filters: Some(overrides),
        ..FileConfig::default()
    };

    let cfg = AppConfig::merge(&cli(&[]), EnvOverrides::default(), file_cfg);

    assert!(cfg.output_filter_for("qwen3:8b").is_passthrough());
    assert_eq!(cfg.output_filter_for("qwen3:14b").suppress_leading_chunks, 4);
    assert_eq!(
        cfg.output_filter_for("deepseek-r1:8b").suppress_leading_chunks,
        1
    );
}

#[test]
fn test_offline_flag_forces_offline() {
    let file_cfg = FileConfig {
        offline: Some(false),
        ..FileConfig::default()
    };
    let cfg = AppConfig::merge(&cli(&["--offline"]), EnvOverrides::default(), file_cfg);
    assert_eq!(cfg.offline, Some(true));
}
