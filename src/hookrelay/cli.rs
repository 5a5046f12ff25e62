use std::path::PathBuf;

use clap::Parser;

use crate::error::RelayError;
use crate::hookrelay::config::{RelayConfig, StoreEngine};

/// Relays raw HTTP requests to chat subscribers.
///
/// Flags override values loaded from `--conf`.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// Chat bot token
    #[arg(long = "bot-token")]
    pub bot_token: Option<String>,

    /// HTTP listen address, `:3000` binds every interface
    #[arg(long)]
    pub listen: Option<String>,

    /// Store engine: sqlite (alias boltdb), redis or memory
    #[arg(long)]
    pub store: Option<StoreEngine>,

    /// Store targets: a file path for sqlite, a URL for redis. Repeatable.
    #[arg(long = "dbpath")]
    pub db_path: Vec<String>,

    /// Log every chat API request and response
    #[arg(long)]
    pub debug: bool,

    /// Log level: error, warn, info, debug or trace
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Identity allowed to run /addid and /rmid
    #[arg(long = "admin-id")]
    pub admin_id: Option<String>,

    /// Only allow-listed identities may /start
    #[arg(long = "enforce-allowlist")]
    pub enforce_allowlist: bool,
}

impl Cli {
    /// Builds the effective configuration: file first, then flags on top
    pub fn into_config(self) -> Result<RelayConfig, RelayError> {
        let mut config = match &self.conf {
            Some(path) => RelayConfig::from_toml_file(path)?,
            None => RelayConfig::default(),
        };

        if let Some(token) = self.bot_token {
            config.bot_token = token;
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if !self.db_path.is_empty() {
            config.db_path = self.db_path;
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level.to_lowercase();
        }
        if let Some(admin) = self.admin_id {
            config.admin_id = Some(admin);
        }
        if self.enforce_allowlist {
            config.enforce_allowlist = true;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bot_token = \"from-file\"\nlisten = \":4000\"\nstore = \"memory\"").unwrap();

        let cli = Cli::parse_from([
            "hookrelay",
            "--conf",
            file.path().to_str().unwrap(),
            "--bot-token",
            "from-flag",
            "--dbpath",
            "a.db",
            "--dbpath",
            "b.db",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.bot_token, "from-flag");
        assert_eq!(config.listen, ":4000");
        assert_eq!(config.store, StoreEngine::Memory);
        assert_eq!(config.db_path, vec!["a.db".to_string(), "b.db".to_string()]);
    }

    #[test]
    fn rejects_unknown_store_flag() {
        let result = Cli::try_parse_from(["hookrelay", "--store", "etcd"]);
        assert!(result.is_err());
    }
}
