//! Configuration layering: defaults < TOML file < environment.

use std::collections::HashMap;
use std::io::Write;

use hat_agents::config::{AppConfig, ConfigError, DEFAULT_MODEL_URL};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn file_overrides_defaults() {
    let file = write_config(
        r#"
[workflow]
lookup_budget = 2
similarity_threshold = 0.6

[model]
model = "llama-3.3-70b"
temperature = 0.3

[search]
api_key = "tvly-file"
"#,
    );

    let config = AppConfig::load_with(Some(file.path()), env_of(&[])).unwrap();

    assert_eq!(config.workflow.lookup_budget, 2);
    assert_eq!(config.workflow.similarity_threshold, 0.6);
    // Unset keys keep their defaults.
    assert_eq!(config.workflow.cache_ttl_secs, 3600);
    assert_eq!(config.model.model, "llama-3.3-70b");
    assert_eq!(config.model.base_url, DEFAULT_MODEL_URL);
    assert_eq!(config.search_api_key().unwrap(), "tvly-file");
}

#[test]
fn environment_overrides_file() {
    let file = write_config(
        r#"
[workflow]
lookup_budget = 2

[search]
api_key = "tvly-file"
"#,
    );

    let config = AppConfig::load_with(
        Some(file.path()),
        env_of(&[
            ("HATS_LOOKUP_BUDGET", "6"),
            ("TAVILY_API_KEY", "tvly-env"),
            ("HATS_MODEL_URL", "http://localhost:8080/v1"),
        ]),
    )
    .unwrap();

    assert_eq!(config.workflow.lookup_budget, 6);
    assert_eq!(config.search_api_key().unwrap(), "tvly-env");
    assert_eq!(config.model.base_url, "http://localhost:8080/v1");
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("[workflow\nlookup_budget = 2");
    let err = AppConfig::load_with(Some(file.path()), env_of(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = AppConfig::load_with(Some(&path), env_of(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn zero_ttl_in_file_fails_validation() {
    let file = write_config("[workflow]\ncache_ttl_secs = 0\n");
    let err = AppConfig::load_with(Some(file.path()), env_of(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Workflow(_)));
}
