//! Configuration manager for eventgate.

use std::fs::File;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_REF;
use crate::store::Project;
use crate::store::memory::DEFAULT_BUILD_HISTORY;
use crate::validation::AckKey;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors that may occur during the configuration loading process.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid listen address `{0}`")]
    Address(String),
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listen address, `host:port`.
    pub address: String,
    /// Name of the project secret holding the gateway token.
    pub token_secret: String,
    /// Key used to echo validation codes.
    pub validation_key: AckKey,
    /// Ref every triggered build runs against.
    pub default_ref: String,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
    /// Builds kept by the in-memory build store.
    pub build_history: usize,
    pub telemetry: Telemetry,
    /// Projects served by the in-memory registry.
    #[serde(skip_serializing)]
    pub projects: Vec<Project>,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
}

/// Logging and metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit logs as JSON lines.
    pub json: bool,
    /// Expose `GET /metrics`.
    pub prometheus: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            prometheus: false,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").into(),
            address: "0.0.0.0:7748".into(),
            token_secret: "eventGridToken".into(),
            validation_key: AckKey::default(),
            default_ref: DEFAULT_REF.into(),
            timeout_secs: 10,
            build_history: DEFAULT_BUILD_HISTORY,
            telemetry: Telemetry::default(),
            projects: Vec::new(),
            version: VERSION.to_owned(),
            path: PathBuf::new(),
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file yields the default configuration, an unreadable or
    /// invalid one is an error. An explicit path is never swapped for the
    /// default location.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        } else {
            self.path.clone()
        };

        let config = match File::open(&file_path) {
            Ok(file) => Self {
                path: file_path,
                ..serde_yaml::from_reader(file)?
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };

        // fail early rather than at bind time.
        config.socket_addr(None)?;

        Ok(Arc::new(Self {
            version: VERSION.to_owned(),
            ..config
        }))
    }

    /// File the values were read from, `None` for defaults.
    pub fn source(&self) -> Option<&Path> {
        Some(self.path.as_path()).filter(|path| !path.as_os_str().is_empty())
    }

    /// Listen address, with an optional port override.
    pub fn socket_addr(&self, port: Option<u16>) -> Result<SocketAddr, ConfigError> {
        let mut addr: SocketAddr = self
            .address
            .parse()
            .map_err(|_| ConfigError::Address(self.address.clone()))?;

        if let Some(port) = port {
            addr.set_port(port);
        }

        Ok(addr)
    }
}
