use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Where and how the server logs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub environment: String,
    pub level: LogLevel,
    pub directory: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let fallback = if environment == "production" {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        Self {
            level: std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback),
            directory: PathBuf::from(
                std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            ),
            environment,
        }
    }
}

impl LogConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        format!(
            "commerce_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}
