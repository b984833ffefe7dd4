//! Log settings resolved from the environment and CLI flags.
//!
//! Precedence, lowest to highest:
//! 1. built-in default (`info`, human format)
//! 2. `RUST_LOG` directives
//! 3. `HH_LOG` level, `HH_LOG_FORMAT`
//! 4. `-v`/`-q` counts, `--log-format`, `--no-color`

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

pub const ENV_LOG_LEVEL: &str = "HH_LOG";
pub const ENV_LOG_FORMAT: &str = "HH_LOG_FORMAT";
pub const ENV_RUST_LOG: &str = "RUST_LOG";

/// Where log lines go and how they look. Always stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "human" | "text" | "pretty" => Ok(Self::Human),
            "jsonl" | "json" | "ndjson" => Ok(Self::Jsonl),
            _ => Err(format!("log format must be human or jsonl, got '{s}'")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbosity ladder, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
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
    const LADDER: [LogLevel; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Off,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }

    /// Step down the ladder once per `-v` and up once per `-q`.
    pub fn adjusted(self, verbose: u8, quiet: u8) -> Self {
        let rung = Self::LADDER.iter().position(|l| *l == self).unwrap_or(2) as i32;
        let shifted = (rung - i32::from(verbose) + i32::from(quiet))
            .clamp(0, Self::LADDER.len() as i32 - 1);
        Self::LADDER[shifted as usize]
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
            Self::Off => LevelFilter::OFF,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name == "warning" {
            return Ok(Self::Warn);
        }
        if name == "quiet" || name == "none" {
            return Ok(Self::Off);
        }
        Self::LADDER
            .into_iter()
            .find(|level| level.as_str() == name)
            .ok_or_else(|| format!("unrecognized log level '{s}'"))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CLI flags that affect logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOverrides {
    pub verbose: u8,
    pub quiet: u8,
    pub format: Option<LogFormat>,
    pub no_color: bool,
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `RUST_LOG` directives, kept only while nothing with higher
    /// precedence has pinned the level.
    pub directives: Option<String>,
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: LogLevel::Info,
            directives: None,
            color: true,
        }
    }
}

impl LogConfig {
    pub fn from_env(overrides: LogOverrides) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), overrides)
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn resolve<F>(lookup: F, overrides: LogOverrides) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            directives: lookup(ENV_RUST_LOG).filter(|d| !d.trim().is_empty()),
            ..Self::default()
        };

        // An unparseable HH_LOG is ignored rather than fatal.
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|v| v.parse::<LogLevel>().ok()) {
            config.level = level;
            config.directives = None;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse::<LogFormat>().ok()) {
            config.format = format;
        }

        if overrides.verbose > 0 || overrides.quiet > 0 {
            config.level = config.level.adjusted(overrides.verbose, overrides.quiet);
            config.directives = None;
        }
        if let Some(format) = overrides.format {
            config.format = format;
        }
        config.color = !overrides.no_color;

        config
    }

    /// Filter string for `EnvFilter`.
    pub fn filter_directives(&self) -> String {
        match &self.directives {
            Some(directives) => directives.clone(),
            None => format!("hh_core={}", self.level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("ndjson".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!(" Human ".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());

        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("none".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn verbosity_flags_walk_the_ladder() {
        assert_eq!(LogLevel::Info.adjusted(1, 0), LogLevel::Debug);
        assert_eq!(LogLevel::Info.adjusted(7, 0), LogLevel::Trace);
        assert_eq!(LogLevel::Info.adjusted(0, 2), LogLevel::Error);
        assert_eq!(LogLevel::Info.adjusted(0, 9), LogLevel::Off);
        assert_eq!(LogLevel::Warn.adjusted(2, 2), LogLevel::Warn);
    }

    #[test]
    fn defaults_without_environment() {
        let config = LogConfig::resolve(env(&[]), LogOverrides::default());
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.filter_directives(), "hh_core=info");
    }

    #[test]
    fn rust_log_directives_pass_through() {
        let config = LogConfig::resolve(
            env(&[("RUST_LOG", "hh_core::pipeline=trace")]),
            LogOverrides::default(),
        );
        assert_eq!(config.filter_directives(), "hh_core::pipeline=trace");
    }

    #[test]
    fn hh_log_beats_rust_log() {
        let config = LogConfig::resolve(
            env(&[("HH_LOG", "error"), ("RUST_LOG", "debug")]),
            LogOverrides::default(),
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.filter_directives(), "hh_core=error");
    }

    #[test]
    fn flags_beat_environment() {
        let config = LogConfig::resolve(
            env(&[("HH_LOG", "warn"), ("HH_LOG_FORMAT", "jsonl")]),
            LogOverrides {
                verbose: 2,
                format: Some(LogFormat::Human),
                no_color: true,
                ..LogOverrides::default()
            },
        );
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Human);
        assert!(!config.color);
    }

    #[test]
    fn verbosity_drops_rust_log_directives() {
        let config = LogConfig::resolve(
            env(&[("RUST_LOG", "trace")]),
            LogOverrides {
                quiet: 1,
                ..LogOverrides::default()
            },
        );
        assert_eq!(config.directives, None);
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn level_maps_to_filter() {
        assert_eq!(LogLevel::Off.filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::Debug.filter(), LevelFilter::DEBUG);
    }
}
