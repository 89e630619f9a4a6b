//! # Configuration
//!
//! Settings are read, never written:
//! - an embedded default YAML document (`pmompd.yaml`),
//! - merged with `config.yaml` from the configuration directory if present,
//! - then patched with `PMOMPD_CONFIG__*` environment variables.
//!
//! Keys are case-insensitive. The configuration directory is, in order, the
//! one passed to [`MpdConfig::load`], `$PMOMPD_CONFIG`, `./.pmompd` and
//! `~/.pmompd`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::model::ServerDescriptor;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmompd.yaml");

const ENV_CONFIG_DIR: &str = "PMOMPD_CONFIG";
const ENV_PREFIX: &str = "PMOMPD_CONFIG__";
const CONFIG_FILE: &str = "config.yaml";
const DIR_NAME: &str = ".pmompd";

const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MpdConfig {
    #[serde(default)]
    pub server: Option<ServerDescriptor>,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub directory_based: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            directory_based: false,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl MpdConfig {
    /// Loads the configuration from `directory` (or the usual locations) and
    /// the process environment.
    pub fn load(directory: Option<&Path>) -> Result<Self> {
        let dir = find_config_dir(directory);
        info!(config_dir=%dir.display(), "Using pmompd config directory");
        Self::load_from(Some(&dir.join(CONFIG_FILE)), env::vars())
    }

    /// Loads `file` (when it exists) over the defaults, then applies the
    /// `PMOMPD_CONFIG__*` entries found in `vars`.
    pub fn load_from(
        file: Option<&Path>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut value = defaults()?;

        if let Some(path) = file {
            if path.exists() {
                let data = fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let external: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                info!(config_file=%path.display(), "Loaded config file");
                merge_lowered(&mut value, external);
            } else {
                debug!(config_file=%path.display(), "Config file not found, using defaults");
            }
        }

        apply_env_overrides(&mut value, vars);
        Self::from_value(value)
    }

    /// Parses a YAML document merged over the defaults. No environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value = defaults()?;
        merge_lowered(&mut value, serde_yaml::from_str(yaml)?);
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: MpdConfig =
            serde_yaml::from_value(value).context("Invalid pmompd configuration")?;
        if let Some(server) = &config.server {
            if !server.is_valid() {
                return Err(anyhow!("Invalid MPD server in configuration: {}", server));
            }
        }
        Ok(config)
    }
}

fn find_config_dir(directory: Option<&Path>) -> PathBuf {
    if let Some(dir) = directory {
        return dir.to_path_buf();
    }
    if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
        return PathBuf::from(env_path);
    }
    if Path::new(DIR_NAME).exists() {
        return PathBuf::from(DIR_NAME);
    }
    if let Some(home) = home_dir() {
        let home_config = home.join(DIR_NAME);
        if home_config.exists() {
            return home_config;
        }
    }
    PathBuf::from(DIR_NAME)
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = path.split("__").collect::<Vec<_>>();
        if let Err(err) = set_value(config, &key_path, convert_env_value(&value)) {
            debug!(env_var=%key, "Ignoring config override: {}", err);
        }
    }
}

fn set_value(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if data.is_null() {
        *data = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };
    let key = Value::String(path[0].to_lowercase());
    if path.len() == 1 {
        map.insert(key, value);
        return Ok(());
    }
    let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
    set_value(entry, &path[1..], value)
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn defaults() -> Result<Value> {
    let mut value = Value::Null;
    merge_lowered(&mut value, serde_yaml::from_str(DEFAULT_CONFIG)?);
    Ok(value)
}

/// Overlays `external` on `target`. Mapping keys are lowercased on the way in
/// and merged one by one; any other value replaces what `target` held.
fn merge_lowered(target: &mut Value, external: Value) {
    match external {
        Value::Mapping(entries) => {
            if !target.is_mapping() {
                *target = Value::Mapping(Mapping::new());
            }
            let Value::Mapping(map) = target else {
                return;
            };
            for (key, value) in entries {
                let key = match key {
                    Value::String(name) => Value::String(name.to_lowercase()),
                    other => other,
                };
                merge_lowered(map.entry(key).or_insert(Value::Null), value);
            }
        }
        Value::Sequence(items) => {
            *target = Value::Sequence(
                items
                    .into_iter()
                    .map(|item| {
                        let mut slot = Value::Null;
                        merge_lowered(&mut slot, item);
                        slot
                    })
                    .collect(),
            );
        }
        other => *target = other,
    }
}
