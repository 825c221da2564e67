use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("sweep.volumes must not be empty")]
    EmptyVolumes,
    #[error("sweep.concurrency_levels must not be empty")]
    EmptyConcurrency,
    #[error("sweep.volumes must be greater than zero")]
    ZeroVolume,
    #[error("sweep.concurrency_levels must be at least 1")]
    ZeroConcurrency,
    #[error("duplicate volume {0} in sweep.volumes")]
    DuplicateVolume(u64),
    #[error("duplicate concurrency level {0} in sweep.concurrency_levels")]
    DuplicateConcurrency(usize),
    #[error("sweep.exchange_timeout_ms must be greater than zero when set")]
    ZeroTimeout,
    #[error("sweep.commands must contain at least one command")]
    NoCommands,
    #[error("duplicate command name '{0}'")]
    DuplicateCommand(String),
    #[error("command '{name}' has an empty or whitespace-containing command word")]
    InvalidCommandWord { name: String },
    #[error("command '{name}' argument '{arg}' must not contain ';'")]
    InvalidArgument { name: String, arg: String },
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub sweep: SweepConfig,
    pub metrics: MetricsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parses and validates a YAML document. Missing sections fall back to
    /// their defaults, so an empty document yields the stock sweep.
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        let config: Config = if data.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(data)?
        };
        config.sweep.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8013,
        }
    }
}

/// How a cell's throughput numerator is chosen.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThroughputBasis {
    /// `volume / elapsed`, regardless of how many exchanges failed.
    #[default]
    Configured,
    /// `volume * (completed / launched) / elapsed`.
    Completed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SweepConfig {
    /// Request counts each cell's throughput is normalized against (rows).
    pub volumes: Vec<u64>,
    /// Concurrent exchanges per batch (columns). Iterated as the outer loop.
    pub concurrency_levels: Vec<usize>,
    pub commands: Vec<CommandConfig>,
    /// Per-exchange deadline covering connect, write and read. Unset means
    /// the exchange waits as long as the OS lets it.
    pub exchange_timeout_ms: Option<u64>,
    pub throughput_basis: ThroughputBasis,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            volumes: default_volumes(),
            concurrency_levels: vec![5, 10, 50, 100],
            commands: default_commands(),
            exchange_timeout_ms: None,
            throughput_basis: ThroughputBasis::Configured,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_axes(&self.volumes, &self.concurrency_levels)?;
        // a zero deadline fails every exchange not ready on its first poll
        if self.exchange_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        validate_command_names(self.commands.iter().map(|c| c.name.as_str()))?;
        for command in &self.commands {
            command.validate()?;
        }
        Ok(())
    }
}

/// Checks the sweep axes: both non-empty, strictly positive, no repeats.
/// Every (volume, concurrency) pair must map to exactly one cell.
pub fn validate_axes(volumes: &[u64], concurrency_levels: &[usize]) -> Result<(), ConfigError> {
    if volumes.is_empty() {
        return Err(ConfigError::EmptyVolumes);
    }
    if concurrency_levels.is_empty() {
        return Err(ConfigError::EmptyConcurrency);
    }

    let mut seen = HashSet::new();
    for &volume in volumes {
        if volume == 0 {
            return Err(ConfigError::ZeroVolume);
        }
        if !seen.insert(volume) {
            return Err(ConfigError::DuplicateVolume(volume));
        }
    }

    let mut seen = HashSet::new();
    for &level in concurrency_levels {
        if level == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if !seen.insert(level) {
            return Err(ConfigError::DuplicateConcurrency(level));
        }
    }
    Ok(())
}

pub fn validate_command_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateCommand(name.to_string()));
        }
    }
    if seen.is_empty() {
        return Err(ConfigError::NoCommands);
    }
    Ok(())
}

/// One protocol command exercised by the sweep, e.g. `SEND jae;joe;hahaman`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// Key for the command's result matrix ("send", "cache").
    pub name: String,
    /// Command word written before the first space.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandConfig {
    pub fn new(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Wire form: command word, one space, semicolon-separated arguments.
    pub fn payload(&self) -> String {
        format!("{} {}", self.command, self.args.join(";"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.command.is_empty() || self.command.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidCommandWord {
                name: self.name.clone(),
            });
        }
        if let Some(arg) = self.args.iter().find(|a| a.contains(';')) {
            return Err(ConfigError::InvalidArgument {
                name: self.name.clone(),
                arg: arg.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9102,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the YAML results document is written. Unset disables the file.
    pub results_path: Option<String>,
    /// Print one text table per command to stdout after the sweep.
    pub print_tables: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: Some("results/concurrent.yaml".to_string()),
            print_tables: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// 100 through 1000 in steps of 50.
pub fn default_volumes() -> Vec<u64> {
    (100..=1000).step_by(50).collect()
}

pub fn default_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig::new("send", "SEND", &["jae", "joe", "hahaman"]),
        CommandConfig::new("cache", "CACHE", &["jae", "joe", "hahafool"]),
    ]
}
