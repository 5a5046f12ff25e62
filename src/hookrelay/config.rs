use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::error::{RelayError, ErrorCode};

/// Persistent key-value engines the relay can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoreEngine {
    /// Embedded single-file engine
    Sqlite,
    /// Networked engine
    Redis,
    /// Process-local engine, nothing survives a restart
    Memory,
}

impl FromStr for StoreEngine {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "boltdb" => Ok(Self::Sqlite),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(RelayError::new(ErrorCode::UnknownEngine, format!("Unknown store engine: {}", other))),
        }
    }
}

impl TryFrom<String> for StoreEngine {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreEngine> for String {
    fn from(engine: StoreEngine) -> Self {
        engine.to_string()
    }
}

impl fmt::Display for StoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bot_token: String,
    pub listen: String,
    pub store: StoreEngine,
    pub db_path: Vec<String>,
    pub bucket: String,
    pub debug: bool,
    pub log_level: String,
    /// The only identity allowed to edit the allow-list
    pub admin_id: Option<String>,
    pub enforce_allowlist: bool,
    pub parse_mode: Option<String>,
    pub min_send_interval_ms: Option<u64>,
    pub max_concurrent_updates: usize,
    pub poll_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub transport_retries: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            listen: ":3000".to_string(),
            store: StoreEngine::Sqlite,
            db_path: vec!["./data.db".to_string()],
            bucket: "tgDB".to_string(),
            debug: false,
            log_level: "info".to_string(),
            admin_id: None,
            enforce_allowlist: false,
            parse_mode: None,
            min_send_interval_ms: None,
            max_concurrent_updates: 64,
            poll_timeout_secs: 60,
            connect_timeout_secs: 10,
            transport_retries: 5,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let content = fs::read_to_string(path)
            .map_err(|e| RelayError::new(ErrorCode::ConfigInvalid, format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RelayError> {
        toml::from_str(content)
            .map_err(|e| RelayError::new(ErrorCode::ConfigInvalid, format!("Failed to parse TOML: {}", e)))
    }

    /// Resolves the listen address; a bare `:port` binds every interface
    pub fn listen_addr(&self) -> Result<SocketAddr, RelayError> {
        let addr = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };

        addr.parse()
            .map_err(|e| RelayError::new(ErrorCode::ConfigInvalid, format!("Invalid listen address {:?}: {}", self.listen, e)))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn min_send_interval(&self) -> Option<Duration> {
        self.min_send_interval_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// Checks everything that would otherwise fail late during startup
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.bot_token.trim().is_empty() {
            return Err(RelayError::new(ErrorCode::ConfigInvalid, "Bot token must not be empty"));
        }
        if self.db_path.is_empty() && self.store != StoreEngine::Memory {
            return Err(RelayError::new(ErrorCode::ConfigInvalid, "At least one dbpath is required"));
        }
        if self.max_concurrent_updates == 0 {
            return Err(RelayError::new(ErrorCode::ConfigInvalid, "max_concurrent_updates must be positive"));
        }
        self.listen_addr()?;
        Ok(())
    }
}
