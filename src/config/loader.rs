// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_BRIDGE_THREAD_PREFIX, DEFAULT_DEBOUNCE_MS};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for the concurrency-bearing parts of the engine.
///
/// Pull pipelines and synchronous arrows need no configuration; only the
/// components that own a queue or a background thread read these values.
/// Every section is optional and falls back to built-in defaults.
///
/// # Example
/// ```yaml
/// bridge:
///   max_queue_size: 1024
///   full_policy: drop_newest
///   thread_name_prefix: ingest
/// aggregator:
///   debounce_ms: 100
/// queue:
///   max_number_of_elements: 512
/// ```
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// What a bounded bridge does when a producer finds its queue full.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FullPolicy {
    /// Block the producer until the worker frees a slot
    #[default]
    Block,
    /// Discard the incoming message and keep going
    DropNewest,
    /// Hand a `QueueFull` fault back to the producer
    Reject,
}

/// Configuration for a `ConcurrentBridge`.
///
/// # Fields
/// * `max_queue_size` - Bound on pending messages; unbounded when absent
/// * `full_policy` - Behaviour once a bounded queue is full (defaults to `block`)
/// * `thread_name_prefix` - Prefix for the worker thread name
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct BridgeConfig {
    pub max_queue_size: Option<usize>,
    #[serde(default)]
    pub full_policy: FullPolicy,
    pub thread_name_prefix: Option<String>,
}

impl BridgeConfig {
    /// Bounded configuration with the given capacity and policy.
    pub fn bounded(max_queue_size: usize, full_policy: FullPolicy) -> Self {
        Self {
            max_queue_size: Some(max_queue_size),
            full_policy,
            thread_name_prefix: None,
        }
    }

    pub fn get_thread_name_prefix(&self) -> &str {
        self.thread_name_prefix
            .as_deref()
            .unwrap_or(DEFAULT_BRIDGE_THREAD_PREFIX)
    }
}

/// Configuration for an `AggregatedNotificator`.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub debounce_ms: Option<u64>,
}

impl AggregatorConfig {
    /// Quiet period after the last push before the batch is flushed.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }
}

/// Configuration for a `LockFreeQueue`.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct QueueConfig {
    /// Eviction threshold; the queue is unbounded when absent
    pub max_number_of_elements: Option<usize>,
}

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

/// Parse a configuration document in the given format.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<EngineConfig, ConfigError> {
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a config file, choosing the parser from its extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, format)
}

/// Load a config file and reject values the engine cannot honour.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

impl EngineConfig {
    /// Collect every invalid setting rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.bridge.max_queue_size == Some(0) {
            problems.push("bridge.max_queue_size must be greater than zero".to_string());
        }
        if self.aggregator.debounce_ms == Some(0) {
            problems.push("aggregator.debounce_ms must be greater than zero".to_string());
        }
        if self.queue.max_number_of_elements == Some(0) {
            problems.push("queue.max_number_of_elements must be greater than zero".to_string());
        }
        if let Some(prefix) = &self.bridge.thread_name_prefix {
            if prefix.trim().is_empty() {
                problems.push("bridge.thread_name_prefix must not be blank".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_full_yaml_config() {
        let yaml = r#"
bridge:
  max_queue_size: 16
  full_policy: drop_newest
  thread_name_prefix: ingest
aggregator:
  debounce_ms: 40
queue:
  max_number_of_elements: 8
"#;

        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.bridge.max_queue_size, Some(16));
        assert_eq!(cfg.bridge.full_policy, FullPolicy::DropNewest);
        assert_eq!(cfg.bridge.get_thread_name_prefix(), "ingest");
        assert_eq!(cfg.aggregator.debounce(), Duration::from_millis(40));
        assert_eq!(cfg.queue.max_number_of_elements, Some(8));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg = parse_config("{}", ConfigFormat::Yaml).unwrap();

        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.bridge.full_policy, FullPolicy::Block);
        assert_eq!(cfg.bridge.max_queue_size, None);
        assert_eq!(cfg.bridge.get_thread_name_prefix(), DEFAULT_BRIDGE_THREAD_PREFIX);
        assert_eq!(cfg.aggregator.debounce(), Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(cfg.queue.max_number_of_elements, None);
    }

    #[test]
    fn test_load_toml_and_json_by_extension() {
        let toml_file = write_temp(
            ".toml",
            "[bridge]\nmax_queue_size = 4\nfull_policy = \"reject\"\n",
        );
        let cfg = load_config(toml_file.path()).unwrap();
        assert_eq!(cfg.bridge.max_queue_size, Some(4));
        assert_eq!(cfg.bridge.full_policy, FullPolicy::Reject);

        let json_file = write_temp(".json", r#"{"aggregator": {"debounce_ms": 15}}"#);
        let cfg = load_config(json_file.path()).unwrap();
        assert_eq!(cfg.aggregator.debounce_ms, Some(15));
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let file = write_temp(".ini", "bridge=1");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_load_and_validate_rejects_zero_sizes() {
        let file = write_temp(
            ".yaml",
            "bridge:\n  max_queue_size: 0\naggregator:\n  debounce_ms: 0\n",
        );

        let err = load_and_validate_config(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid { problems } => {
                assert_eq!(problems.len(), 2);
                assert!(problems[0].contains("bridge.max_queue_size"));
                assert!(problems[1].contains("aggregator.debounce_ms"));
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let err = parse_config("bridge:\n  full_policy: explode\n", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
