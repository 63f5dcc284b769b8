// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Persistent,
    InMemory,
}

impl std::str::FromStr for QueueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persistent" => Ok(QueueType::Persistent),
            "in_memory" => Ok(QueueType::InMemory),
            other => Err(format!(
                "invalid QUEUE_TYPE {:?}, expected persistent or in_memory",
                other
            )),
        }
    }
}

/// Log verbosity, per the `LOG_LEVEL` configuration key.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Debug,
    Warning,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!(
                "invalid LOG_LEVEL {:?}, expected one of INFO, DEBUG, WARNING, ERROR",
                other
            )),
        }
    }
}

impl LogLevel {
    /// The `tracing_subscriber::EnvFilter` directive for this level.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "Signing Shim",
    about = "Reliability shim in front of a rate-limited, unreliable signing service"
)]
pub struct ShimOptions {
    /// Auth header sent to the upstream signing service.
    #[structopt(long, env = "API_KEY")]
    pub api_key: String,

    /// Base URL of the upstream signing service.
    #[structopt(long, env = "UNRELIABLE_SERVICE_URL")]
    pub unreliable_service_url: surf::Url,

    /// Log verbosity: one of INFO, DEBUG, WARNING, ERROR.
    #[structopt(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: LogLevel,

    /// Queue backend: `persistent` or `in_memory`.
    #[structopt(long, env = "QUEUE_TYPE", default_value = "persistent")]
    pub queue_type: QueueType,

    /// Directory for the persistent queue store. Required iff
    /// `queue_type == persistent`.
    #[structopt(long, env = "PERSISTENT_QUEUE_PATH", default_value = "")]
    pub persistent_queue_path: String,

    /// Number of attempts before a task transitions to FAIL.
    #[structopt(long, env = "MAX_TASK_RETRIES", default_value = "5")]
    pub max_task_retries: u32,

    /// Upstream requests allowed per minute.
    #[structopt(long, env = "MAX_REQUESTS_PER_MINUTE", default_value = "10")]
    pub max_requests_per_minute: u32,

    /// Fire a webhook notification on terminal FAIL in addition to
    /// SUCCESS (extension point; off by default to match the spec).
    #[structopt(long, env = "NOTIFY_ON_FAILURE")]
    pub notify_on_failure: bool,

    /// Binding port for the ingress HTTP server.
    #[structopt(long, env = "SHIM_PORT", default_value = "8080")]
    pub port: u16,
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("PERSISTENT_QUEUE_PATH is required when QUEUE_TYPE=persistent"))]
    MissingPersistentQueuePath,
}

impl ShimOptions {
    pub fn persistent_queue_path(&self) -> Result<PathBuf, ConfigError> {
        if self.persistent_queue_path.is_empty() {
            return Err(ConfigError::MissingPersistentQueuePath);
        }
        Ok(PathBuf::from(&self.persistent_queue_path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_type == QueueType::Persistent {
            self.persistent_queue_path()?;
        }
        Ok(())
    }
}
