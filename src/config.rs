//! Configuration for the facade.
//!
//! Loaded from TOML. Every section has defaults, so an empty file yields a
//! facade talking to `127.0.0.1:6379` with all actions allowed.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::{Action, ActionPolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Primary (read-write) endpoint.
    pub master: EndpointConfig,

    /// Optional read replica; when absent reads go to master.
    pub replica: Option<EndpointConfig>,

    /// Allowed action categories.
    pub policy: PolicyConfig,

    /// Logging settings used by the CLI.
    pub logging: LoggingConfig,
}

impl FacadeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.master.validate("master")?;
        if let Some(ref replica) = self.replica {
            replica.validate("replica")?;
        }
        Ok(())
    }
}

/// One store endpoint and the pool in front of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Server host.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Limit on establishing the TCP connection.
    #[serde(with = "opt_duration")]
    pub connect_timeout: Option<Duration>,

    /// Limit on each request/reply round trip.
    #[serde(with = "opt_duration")]
    pub socket_timeout: Option<Duration>,

    /// ACL user name; only sent together with a password.
    pub username: Option<String>,

    /// Password for AUTH.
    pub password: Option<String>,

    /// Logical database index to SELECT on connect.
    pub database: u8,

    /// Pool sizing.
    pub pool: PoolSettings,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            connect_timeout: Some(Duration::from_secs(2)),
            socket_timeout: Some(Duration::from_secs(2)),
            username: None,
            password: None,
            database: 0,
            pool: PoolSettings::default(),
        }
    }
}

impl EndpointConfig {
    /// Endpoint for `host:port` with default settings.
    pub fn from_addr(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// The `host:port` string to connect to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config(format!("{}.host cannot be empty", name)));
        }
        if self.port == 0 {
            return Err(Error::Config(format!("{}.port cannot be 0", name)));
        }
        if self.pool.max_size == 0 {
            return Err(Error::Config(format!(
                "{}.pool.max_size cannot be 0",
                name
            )));
        }
        if self.username.is_some() && self.password.is_none() {
            return Err(Error::Config(format!(
                "{}.username requires {}.password",
                name, name
            )));
        }
        Ok(())
    }
}

/// Pool sizing for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of connections checked out at once.
    pub max_size: usize,

    /// How long a borrow may wait for a free connection; `None` waits forever.
    #[serde(with = "opt_duration")]
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 8,
            acquire_timeout: None,
        }
    }
}

/// Allowed actions for this instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Action names; an empty list denies everything.
    pub allow: Vec<Action>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow: Action::ALL.to_vec(),
        }
    }
}

impl PolicyConfig {
    /// Build the immutable policy value.
    pub fn to_policy(&self) -> ActionPolicy {
        ActionPolicy::new(self.allow.iter().copied())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Optional durations as human-readable strings ("500ms", "2s", "1m").
mod opt_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => humantime::parse_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
