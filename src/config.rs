//! Layered configuration.
//!
//! Built-in defaults, then each YAML file that exists, then
//! `FEEDGUARD__SECTION__KEY` variables, then the `FEEDGUARD_CONFIG_JSON`
//! document. Every layer may only touch keys the defaults already define.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use change_coalescer::{CoalescerConfig, DiscoveryConfig};
use classification::AuthorityConfig;
use item_scanner::CacheConfig;
use reconcile_pipeline::PipelineConfig;

use crate::errors::ConfigError;

const ENV_PREFIX: &str = "FEEDGUARD__";
const ENV_JSON: &str = "FEEDGUARD_CONFIG_JSON";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedGuardConfig {
    pub cache: CacheConfig,
    pub coalescer: CoalescerConfig,
    pub discovery: DiscoveryConfig,
    pub pipeline: PipelineConfig,
    pub authority: AuthorityConfig,
    pub logging: LoggingConfig,
}

impl FeedGuardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("cache.capacity", self.cache.capacity as u64),
            ("cache.ttl_ms", self.cache.ttl_ms),
            ("coalescer.quiet_window_ms", self.coalescer.quiet_window_ms),
            ("discovery.content_timeout_ms", self.discovery.content_timeout_ms),
            ("discovery.navigation_timeout_ms", self.discovery.navigation_timeout_ms),
            ("pipeline.classify_timeout_ms", self.pipeline.classify_timeout_ms),
            ("authority.edge_capacity", self.authority.edge_capacity as u64),
        ];
        for (path, value) in positive {
            if value == 0 {
                return Err(invalid_value(path, "must be greater than zero"));
            }
        }
        if !self.authority.threshold.is_finite() || self.authority.threshold < 0.0 {
            return Err(invalid_value(
                "authority.threshold",
                "must be a non-negative number",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(invalid_value("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid_value(path: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FeedGuardConfig, ConfigError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<FeedGuardConfig, ConfigError> {
    let mut tree = serde_json::to_value(FeedGuardConfig::default())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            apply_overlays(&mut tree, overlays_from_file(path)?)?;
        }
    }
    if options.include_env {
        apply_overlays(&mut tree, overlays_from_env()?)?;
    }

    let config: FeedGuardConfig =
        serde_json::from_value(tree).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

struct Overlay {
    path: String,
    value: Value,
}

fn apply_overlays(tree: &mut Value, overlays: Vec<Overlay>) -> Result<(), ConfigError> {
    for overlay in overlays {
        let slot = overlay
            .path
            .split('.')
            .try_fold(&mut *tree, |node, segment| node.get_mut(segment))
            .ok_or_else(|| ConfigError::UnsupportedPath(overlay.path.clone()))?;
        if slot.is_object() {
            return Err(ConfigError::UnsupportedPath(overlay.path));
        }
        *slot = overlay.value;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<Overlay>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, None))
}

fn overlays_from_env() -> Result<Vec<Overlay>, ConfigError> {
    let mut overlays = Vec::new();
    let mut vars: Vec<(String, String)> = env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect();
    vars.sort();
    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push(Overlay {
            path,
            value: parse_env_value(&raw),
        });
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| ConfigError::Invalid(format!("{ENV_JSON}: {err}")))?;
            overlays.extend(flatten_value(json_value, None));
        }
    }
    Ok(overlays)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>) -> Vec<Overlay> {
    match value {
        Value::Object(map) => flatten_object(map, prefix),
        other => match prefix {
            Some(path) => vec![Overlay { path, value: other }],
            None => Vec::new(),
        },
    }
}

fn flatten_object(map: Map<String, Value>, prefix: Option<String>) -> Vec<Overlay> {
    let mut result = Vec::new();
    for (key, value) in map {
        let segment = key.trim().to_ascii_lowercase();
        let next = match &prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}.{segment}"),
            _ => segment,
        };
        result.extend(flatten_value(value, Some(next)));
    }
    result
}
