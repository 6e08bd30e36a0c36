use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "NOTIFIER_CONFIG";

/// Collector overrides read by the classic supervisor notifier
pub const SERVER_ENV: &str = "LOGSTASH_SERVER";
pub const PORT_ENV: &str = "LOGSTASH_PORT";

/// Main notifier configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub record: RecordConfig,
    pub filter: FilterConfig,
    /// Also forward `PROCESS_LOG_STDOUT` / `PROCESS_LOG_STDERR`
    pub capture_output: bool,
    /// Environment variables attached to each record as `user_data`
    pub include: Vec<String>,
    pub log_level: LogLevel,
    /// Write diagnostics here instead of stderr
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordConfig {
    pub logger_name: String,
    pub message_type: String,
    /// Value of the `path` field; defaults to the builder's source file
    pub source_tag: Option<String>,
    pub tags: Vec<String>,
    /// Terminate each datagram with a newline (for line based inputs)
    pub append_newline: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Event names to forward; a trailing `*` matches a prefix
    pub events: Vec<String>,
    /// Regex a process name must match
    pub processes: Option<String>,
    /// Regex a group name must match
    pub groups: Option<String>,
}

/// Diagnostic log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// Process states forwarded when no event list is configured
pub const DEFAULT_STATES: &[&str] = &["BACKOFF", "FATAL", "EXITED", "STOPPED", "STARTING", "RUNNING"];

/// Events added when process output capture is on
pub const CAPTURE_EVENTS: &[&str] = &["PROCESS_LOG_STDOUT", "PROCESS_LOG_STDERR"];

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5959,
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            logger_name: "supervisor".to_string(),
            message_type: "logstash".to_string(),
            source_tag: None,
            tags: Vec::new(),
            append_newline: false,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            events: DEFAULT_STATES.iter().map(|s| format!("PROCESS_STATE_{}", s)).collect(),
            processes: None,
            groups: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Self::expand_path(Path::new(&env_path));
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", CONFIG_ENV, e);
                    }
                }
            }
        }

        // Try ~/.config/logstash-notifier/notifier.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("logstash-notifier").join("notifier.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("notifier.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply `LOGSTASH_SERVER` / `LOGSTASH_PORT` on top of the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(SERVER_ENV).filter(|h| !h.trim().is_empty()) {
            self.collector.host = host.trim().to_string();
        }
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            self.collector.port = port
                .trim()
                .parse()
                .context(format!("Invalid {} value '{}'", PORT_ENV, port))?;
        }
        Ok(())
    }

    /// Event names this listener forwards, including captured output
    pub fn effective_events(&self) -> Vec<String> {
        let mut events = self.filter.events.clone();
        if self.capture_output {
            for name in CAPTURE_EVENTS {
                if !events.iter().any(|e| e == name) {
                    events.push(name.to_string());
                }
            }
        }
        events
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}
