use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::DispatchError;

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_TASK_LATENCY: Duration = Duration::from_secs(2);

/// How a batch reacts to a failing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Run every item and report failures once the batch is done.
    #[default]
    CollectAndReport,
    /// Stop starting new items after the first failure. Items already
    /// running finish; the rest are reported as skipped.
    FailFast,
}

/// Resolved dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub pool_size: usize,
    pub task_latency: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            task_latency: DEFAULT_TASK_LATENCY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Raw TOML file structure for `<config_dir>/fanout/config.toml`.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pool_size: Option<usize>,
    task_latency_ms: Option<u64>,
    failure_policy: Option<FailurePolicy>,
}

/// Values taken from `FANOUT_*` environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub pool_size: Option<usize>,
    pub task_latency_ms: Option<u64>,
    pub fail_fast: Option<bool>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            pool_size: parse_env("FANOUT_POOL_SIZE")?,
            task_latency_ms: parse_env("FANOUT_TASK_LATENCY_MS")?,
            fail_fast: std::env::var("FANOUT_FAIL_FAST")
                .ok()
                .map(|raw| parse_flag("FANOUT_FAIL_FAST", &raw))
                .transpose()?,
        })
    }
}

/// Values given on the command line. These win over everything else.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub pool_size: Option<usize>,
    pub task_latency_ms: Option<u64>,
    pub fail_fast: bool,
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fanout").join("config.toml"))
}

impl DispatchConfig {
    /// Load configuration from file, environment and command line.
    ///
    /// Priority: command line, then `FANOUT_*` environment variables, then
    /// the config file, then built-in defaults. An explicit `config_path`
    /// must exist; the default location is optional.
    pub fn load(config_path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let file_config = match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at {}", path.display());
                }
                read_config_file(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => ConfigFile::default(),
            },
        };

        Self::from_sources(file_config, &EnvOverrides::from_env()?, cli)
    }

    fn from_sources(file: ConfigFile, env: &EnvOverrides, cli: &CliOverrides) -> Result<Self> {
        let pool_size = cli
            .pool_size
            .or(env.pool_size)
            .or(file.pool_size)
            .unwrap_or(DEFAULT_POOL_SIZE);

        let task_latency = cli
            .task_latency_ms
            .or(env.task_latency_ms)
            .or(file.task_latency_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TASK_LATENCY);

        let failure_policy = if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            match env.fail_fast {
                Some(true) => FailurePolicy::FailFast,
                Some(false) => FailurePolicy::CollectAndReport,
                None => file.failure_policy.unwrap_or_default(),
            }
        };

        Self::build(pool_size, task_latency, failure_policy)
    }

    /// Build config from resolved values, rejecting a pool without slots.
    pub fn build(
        pool_size: usize,
        task_latency: Duration,
        failure_policy: FailurePolicy,
    ) -> Result<Self> {
        if pool_size == 0 {
            return Err(DispatchError::InvalidPoolSize(pool_size).into());
        }

        Ok(Self {
            pool_size,
            task_latency,
            failure_policy,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<ConfigFile>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value '{}' for {}", raw, name)),
        Err(_) => Ok(None),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("invalid value '{}' for {}. Expected true or false.", other, name),
    }
}
