use configparser::ini::Ini;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("failed to load config file '{path}': {reason}")]
  Load { path: String, reason: String },

  #[error("TABLE_NAME is not set (environment or [store] table_name)")]
  MissingTableName,
}

/// Log configuration
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LogConfig {
  /// Log file path, if not set, logs will be printed to stdout
  pub file: Option<String>,
  /// Log level, default is "info"
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: default_log_level(),
    }
  }
}

/// Visit counter configuration
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Config {
  /// Store table holding the counter record
  pub table_name: String,

  /// RocksDB directory; the in-memory store is used when unset
  pub data_path: Option<String>,

  /// Gateway listening address
  pub server_addr: String,

  /// Origin allowed by CORS headers; no CORS headers when unset
  pub cors_allow_origin: Option<String>,

  /// Log configuration
  pub log: LogConfig,
}

fn default_server_addr() -> String {
  "0.0.0.0:8080".to_string()
}

impl Config {
  /// Load configuration from the process environment and an optional INI file
  pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
    let ini = match path {
      Some(path) => Some(Self::read_file(path)?),
      None => None,
    };
    Self::resolve(ini.as_ref(), |key| std::env::var(key).ok())
  }

  fn read_file(path: &str) -> Result<Ini, ConfigError> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|reason| ConfigError::Load {
      path: path.to_string(),
      reason,
    })?;
    Ok(ini)
  }

  /// Environment values win over file values
  fn resolve<F>(ini: Option<&Ini>, env: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let lookup = |var: &str, section: &str, key: &str| {
      env(var)
        .or_else(|| ini.and_then(|ini| ini.get(section, key)))
        .filter(|v| !v.is_empty())
    };
    let file_value = |section: &str, key: &str| {
      ini
        .and_then(|ini| ini.get(section, key))
        .filter(|v| !v.is_empty())
    };

    let table_name =
      lookup("TABLE_NAME", "store", "table_name").ok_or(ConfigError::MissingTableName)?;

    Ok(Self {
      table_name,
      data_path: lookup("DATA_PATH", "store", "data_path"),
      server_addr: lookup("SERVER_ADDR", "server", "addr").unwrap_or_else(default_server_addr),
      cors_allow_origin: lookup("CORS_ALLOW_ORIGIN", "server", "cors_allow_origin"),
      log: LogConfig {
        file: file_value("log", "file"),
        level: file_value("log", "level").unwrap_or_else(default_log_level),
      },
    })
  }
}
