//! Server configuration.

use crate::{DEFAULT_INGEST_PORT, DEFAULT_QUERY_PORT, DEFAULT_RESOLUTION};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub bind: String,
    /// Port for put lines
    pub ingest_port: u16,
    /// Port for query lines
    pub query_port: u16,
    /// Data directory holding one subdirectory per series
    pub dir: PathBuf,
    /// Bucket width, in the time units clients send
    pub resolution: u64,
    /// Maximum number of concurrent clients
    pub max_clients: usize,
    /// Timeout for idle clients (seconds, 0 to disable)
    pub timeout: u32,
    /// Seconds between background flushes of open series (0 to disable)
    pub flush_interval: u64,
    /// Log level
    pub loglevel: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            ingest_port: DEFAULT_INGEST_PORT,
            query_port: DEFAULT_QUERY_PORT,
            dir: PathBuf::from("./perch-data"),
            resolution: DEFAULT_RESOLUTION,
            max_clients: 10_000,
            timeout: 0,
            flush_interval: 1,
            loglevel: LogLevel::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-request traces
    Debug,
    /// Operational detail
    Verbose,
    /// Normal operation
    #[default]
    Notice,
    /// Problems only
    Warning,
}

impl LogLevel {
    /// Parse from a config or CLI value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "verbose" => Some(Self::Verbose),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    /// The equivalent tracing filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Verbose | Self::Notice => "info",
            Self::Warning => "warn",
        }
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(String),

    /// A directive line could not be parsed
    #[error("config parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
}

impl Config {
    /// Load configuration from a file.
    ///
    /// # Format
    /// ```text
    /// # comment
    /// directive value
    /// directive "value with spaces"
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (directive, value) = Self::parse_line(line).ok_or_else(|| ConfigError::Parse {
                line: line_num + 1,
                message: "invalid directive format".to_string(),
            })?;
            config.apply_directive(&directive.to_lowercase(), value, line_num + 1)?;
        }

        Ok(config)
    }

    /// Parse a single config line into directive and value.
    fn parse_line(line: &str) -> Option<(&str, &str)> {
        let mut parts = line.splitn(2, |c: char| c.is_whitespace());
        let directive = parts.next()?.trim();
        let value = parts.next().map(|v| v.trim()).unwrap_or("");

        let value = if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            &value[1..value.len() - 1]
        } else {
            value
        };

        Some((directive, value))
    }

    fn apply_directive(
        &mut self,
        directive: &str,
        value: &str,
        line: usize,
    ) -> Result<(), ConfigError> {
        match directive {
            "bind" => self.bind = value.to_string(),
            "ingest-port" | "port" => self.ingest_port = parse_number(value, line)?,
            "query-port" => self.query_port = parse_number(value, line)?,
            "dir" => self.dir = PathBuf::from(value),
            "resolution" => {
                let resolution: u64 = parse_number(value, line)?;
                if resolution == 0 {
                    return Err(ConfigError::Parse {
                        line,
                        message: "resolution must be positive".to_string(),
                    });
                }
                self.resolution = resolution;
            }
            "maxclients" => self.max_clients = parse_number(value, line)?,
            "timeout" => self.timeout = parse_number(value, line)?,
            "flush-interval" => self.flush_interval = parse_number(value, line)?,
            "loglevel" => {
                self.loglevel = LogLevel::parse(value).ok_or_else(|| ConfigError::Parse {
                    line,
                    message: format!("invalid loglevel: {value}"),
                })?;
            }
            // Unknown directive - ignore for forward compatibility
            _ => {
                tracing::warn!("Unknown config directive at line {}: {}", line, directive);
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Parse {
        line,
        message: format!("invalid number: {value}"),
    })
}
