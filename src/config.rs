//! Layered configuration.
//!
//! Precedence: CLI flags > environment (`DOCOPS_*`) > TOML files > defaults.
//! Files are searched in order (`--config`, `$DOCOPS_CONFIG`,
//! `<config dir>/docops.toml`, `./docops.toml`); for each field the first file
//! that sets it wins.

use crate::errors::DbError;
use crate::store::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DATABASE, DEFAULT_URI, StoreConfig, uri_has_password,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "docops.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_CONFIG: &str = "DOCOPS_CONFIG";
const ENV_URI: &str = "DOCOPS_URI";
const ENV_DATABASE: &str = "DOCOPS_DATABASE";
const ENV_LOG_DIR: &str = "DOCOPS_LOG_DIR";
const ENV_LOG_LEVEL: &str = "DOCOPS_LOG_LEVEL";
const ENV_CONNECT_TIMEOUT: &str = "DOCOPS_CONNECT_TIMEOUT_SECS";

/// One partially filled layer: a config file, the environment or CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Fills every unset field from `lower`.
    fn fill_from(&mut self, lower: Self) {
        self.uri = self.uri.take().or(lower.uri);
        self.database = self.database.take().or(lower.database);
        self.log_dir = self.log_dir.take().or(lower.log_dir);
        self.log_level = self.log_level.take().or(lower.log_level);
        self.connect_timeout_secs = self.connect_timeout_secs.or(lower.connect_timeout_secs);
    }

    fn from_env(env: &impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let connect_timeout_secs = env(ENV_CONNECT_TIMEOUT)
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| {
                        DbError::Config(format!(
                            "{ENV_CONNECT_TIMEOUT} must be a whole number of seconds, got {s:?}"
                        ))
                    })
            })
            .transpose()?;
        Ok(Self {
            uri: env(ENV_URI),
            database: env(ENV_DATABASE),
            log_dir: env(ENV_LOG_DIR).map(PathBuf::from),
            log_level: env(ENV_LOG_LEVEL),
            connect_timeout_secs,
        })
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub uri: String,
    pub database: String,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub connect_timeout_secs: u64,
    /// Problems noticed while loading, reported once logging is up.
    pub warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            log_dir: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            warnings: Vec::new(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            uri: self.uri.clone(),
            database: self.database.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..StoreConfig::default()
        }
    }
}

/// Candidate config files in search order.
#[must_use]
pub fn config_paths(
    cli_path: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_path {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env(ENV_CONFIG) {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths
}

fn is_secret_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.contains("password") || k.contains("passwd") || k.contains("secret") || k.contains("token")
}

/// Dotted paths of keys that look like they hold secrets.
fn scan_for_secret_keys(val: &toml::Value) -> Vec<String> {
    let mut secrets = Vec::new();
    let mut q = VecDeque::new();
    q.push_back((String::new(), val));
    while let Some((prefix, v)) = q.pop_front() {
        if let toml::Value::Table(map) = v {
            for (k, vv) in map {
                let full = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                if is_secret_key(k) {
                    secrets.push(full.clone());
                }
                q.push_back((full, vv));
            }
        }
    }
    secrets
}

fn read_layer(path: &Path, warnings: &mut Vec<String>) -> Result<ConfigLayer, DbError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
    let raw: toml::Value = toml::from_str(&text)
        .map_err(|e| DbError::Config(format!("invalid TOML in {}: {e}", path.display())))?;
    for key in scan_for_secret_keys(&raw) {
        warnings.push(format!("{} stores a secret-looking key {key}", path.display()));
    }
    let layer: ConfigLayer = raw
        .try_into()
        .map_err(|e| DbError::Config(format!("invalid settings in {}: {e}", path.display())))?;
    if layer.uri.as_deref().is_some_and(uri_has_password) {
        warnings.push(format!(
            "{} stores a password inside the connection URI; prefer {ENV_URI}",
            path.display()
        ));
    }
    Ok(layer)
}

/// Resolves settings from explicit inputs. `explicit` is the `--config` path,
/// which must exist; the other candidates are skipped when absent.
///
/// # Errors
/// `DbError::Config` for unreadable or invalid files and malformed env values.
pub fn resolve(
    cli: ConfigLayer,
    explicit: Option<&Path>,
    paths: &[PathBuf],
    env: &impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, DbError> {
    let mut warnings = Vec::new();
    let mut merged = cli;
    merged.fill_from(ConfigLayer::from_env(env)?);
    for path in paths {
        let required = explicit == Some(path.as_path());
        if !required && !path.is_file() {
            continue;
        }
        match read_layer(path, &mut warnings) {
            Ok(layer) => merged.fill_from(layer),
            Err(e) if required => return Err(e),
            Err(e) => warnings.push(format!("ignored config file: {e}")),
        }
    }

    let defaults = AppConfig::default();
    let log_level = merged.log_level.unwrap_or(defaults.log_level).to_ascii_lowercase();
    if !matches!(log_level.as_str(), "error" | "warn" | "info" | "debug" | "trace") {
        return Err(DbError::Config(format!("unknown log level {log_level:?}")));
    }
    Ok(AppConfig {
        uri: merged.uri.unwrap_or(defaults.uri),
        database: merged.database.unwrap_or(defaults.database),
        log_dir: merged.log_dir,
        log_level,
        connect_timeout_secs: merged.connect_timeout_secs.unwrap_or(defaults.connect_timeout_secs),
        warnings,
    })
}

/// Loads configuration from the process environment and the usual files.
///
/// # Errors
/// See [`resolve`].
pub fn load(cli: ConfigLayer, cli_path: Option<&Path>) -> Result<AppConfig, DbError> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    let paths = config_paths(cli_path, &env);
    resolve(cli, cli_path, &paths, &env)
}
