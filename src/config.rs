//! Configuration management
//!
//! Two layers: daemon [`Settings`] (driver, logging, timeouts) loaded from an
//! optional TOML file and the environment, and the [`ConnectionConfig`]
//! resolved from the single command line argument Squid hands us.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::StartupError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_DATABASE: &str = "squid_log";
pub const DEFAULT_TABLE: &str = "access_log";
pub const DEFAULT_USER: &str = "squid";

/// Environment prefix for settings overrides, e.g. `SQUID_DB_LOG_DRIVER=sqlite`.
pub const ENV_PREFIX: &str = "SQUID_DB_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Sqlite,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Mysql => f.write_str("mysql"),
            Driver::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_driver")]
    pub driver: Driver,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `text` for human readable lines, `gcp` for Stackdriver JSON
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Upper bound for a single insert in milliseconds (0 disables it)
    #[serde(default)]
    pub insert_timeout_ms: u64,
}

fn default_driver() -> Driver {
    Driver::Mysql
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            insert_timeout_ms: 0,
        }
    }
}

impl Settings {
    /// Load settings from `path` (missing file is fine) overlaid with
    /// `SQUID_DB_LOG_*` environment variables.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings = builder.build()?;
        let settings: Settings = settings.try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), StartupError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(StartupError::InvalidSettings(format!(
                "invalid log_level '{}', must be one of: {:?}",
                self.log_level, valid_levels
            )));
        }

        let valid_formats = ["text", "gcp"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(StartupError::InvalidSettings(format!(
                "invalid log_format '{}', must be one of: {:?}",
                self.log_format, valid_formats
            )));
        }

        Ok(())
    }

    pub fn insert_timeout(&self) -> Option<Duration> {
        (self.insert_timeout_ms > 0).then(|| Duration::from_millis(self.insert_timeout_ms))
    }
}

/// Where records go. Resolved once at startup, read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub table: String,
    pub user: String,
    pub password: Option<String>,
}

// Keeps the password out of logs and error messages.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionConfig {
    /// Resolve `host/database/table/user/password`, with an optional leading
    /// `/`, into connection parameters. Empty components take their defaults.
    pub fn resolve(input: &str) -> Result<Self, StartupError> {
        let malformed = |reason: &str| StartupError::ConfigMalformed {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut parts: Vec<&str> = input.split('/').collect();
        if parts.len() == 6 && parts[0].is_empty() {
            parts.remove(0);
        }
        let [host, database, table, user, password] = parts[..] else {
            return Err(malformed(
                "expected five '/'-separated components: host/database/table/user/password",
            ));
        };

        let (host, port) = match host.split_once(':') {
            Some((name, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| malformed("port after ':' in host is not a valid number"))?;
                (name, Some(port))
            }
            None => (host, None),
        };

        if !table.is_empty() && !is_identifier(table) {
            return Err(malformed(
                "table name may only contain ASCII letters, digits, '_' and one '.'",
            ));
        }

        let host = or_default(host, DEFAULT_HOST, "host");
        let database = or_default(database, DEFAULT_DATABASE, "database");
        let table = or_default(table, DEFAULT_TABLE, "table");
        let user = or_default(user, DEFAULT_USER, "user");

        let password = if password.is_empty() {
            info!("password not specified, connecting without one");
            None
        } else {
            Some(password.to_string())
        };

        Ok(Self {
            host,
            port,
            database,
            table,
            user,
            password,
        })
    }

    /// Connection target without credentials, safe to log.
    pub fn describe(&self, driver: Driver) -> String {
        match driver {
            Driver::Sqlite => format!("sqlite:{}", self.database),
            Driver::Mysql => match self.port {
                Some(port) => format!("mysql://{}@{}:{}/{}", self.user, self.host, port, self.database),
                None => format!("mysql://{}@{}/{}", self.user, self.host, self.database),
            },
        }
    }
}

fn or_default(value: &str, default: &str, name: &str) -> String {
    if value.is_empty() {
        info!("{} not specified, using default '{}'", name, default);
        default.to_string()
    } else {
        value.to_string()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut segments = name.split('.');
    let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(table), None, None) => valid(table),
        (Some(schema), Some(table), None) => valid(schema) && valid(table),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_components_take_defaults() {
        let cfg = ConnectionConfig::resolve("//tbl//pw").unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.database, "squid_log");
        assert_eq!(cfg.table, "tbl");
        assert_eq!(cfg.user, "squid");
        assert_eq!(cfg.password.as_deref(), Some("pw"));
        assert_eq!(cfg.port, None);
    }

    #[test]
    fn leading_slash_form_is_accepted() {
        let cfg = ConnectionConfig::resolve("/dbhost/logs/access/proxy/secret").unwrap();
        assert_eq!(cfg.host, "dbhost");
        assert_eq!(cfg.database, "logs");
        assert_eq!(cfg.table, "access");
        assert_eq!(cfg.user, "proxy");
        assert_eq!(cfg.password.as_deref(), Some("secret"));
    }

    #[test]
    fn all_empty_resolves_to_defaults_without_password() {
        let cfg = ConnectionConfig::resolve("/////").unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.database, DEFAULT_DATABASE);
        assert_eq!(cfg.table, DEFAULT_TABLE);
        assert_eq!(cfg.user, DEFAULT_USER);
        assert_eq!(cfg.password, None);

        let cfg = ConnectionConfig::resolve("////").unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.password, None);
    }

    #[test]
    fn host_may_carry_a_port() {
        let cfg = ConnectionConfig::resolve("/db.internal:3307////").unwrap();
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, Some(3307));

        let cfg = ConnectionConfig::resolve("/:3307////").unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, Some(3307));
    }

    #[test]
    fn wrong_component_count_is_malformed() {
        for input in ["", "host", "/a/b/c", "a/b/c/d/e/f", "/a/b/c/d/e/f", "//////"] {
            let err = ConnectionConfig::resolve(input).unwrap_err();
            assert!(
                matches!(err, StartupError::ConfigMalformed { .. }),
                "{input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn bad_port_and_table_are_malformed() {
        assert!(matches!(
            ConnectionConfig::resolve("/db:http////"),
            Err(StartupError::ConfigMalformed { .. })
        ));
        assert!(matches!(
            ConnectionConfig::resolve("//log; DROP TABLE x//"),
            Err(StartupError::ConfigMalformed { .. })
        ));
        assert!(ConnectionConfig::resolve("//squid.access_log//").is_ok());
    }

    #[test]
    fn debug_output_hides_password() {
        let cfg = ConnectionConfig::resolve("/h/d/t/u/hunter2").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!cfg.describe(Driver::Mysql).contains("hunter2"));
        assert_eq!(cfg.describe(Driver::Mysql), "mysql://u@h/d");
    }

    #[test]
    fn settings_load_layers_file_and_environment() {
        let tmp = tempfile::TempDir::new().expect("tmp");

        let defaults = Settings::load(&tmp.path().join("absent.toml")).expect("defaults");
        assert_eq!(defaults.driver, Driver::Mysql);
        assert_eq!(defaults.log_level, "info");
        assert_eq!(defaults.insert_timeout(), None);

        let path = tmp.path().join("squid-db-log.toml");
        std::fs::write(&path, "driver = \"sqlite\"\nlog_level = \"debug\"\n").expect("write");
        let from_file = Settings::load(&path).expect("file settings");
        assert_eq!(from_file.driver, Driver::Sqlite);
        assert_eq!(from_file.log_level, "debug");

        std::env::set_var("SQUID_DB_LOG_LOG_LEVEL", "warn");
        std::env::set_var("SQUID_DB_LOG_INSERT_TIMEOUT_MS", "250");
        let layered = Settings::load(&path);
        std::env::remove_var("SQUID_DB_LOG_LOG_LEVEL");
        std::env::remove_var("SQUID_DB_LOG_INSERT_TIMEOUT_MS");
        let layered = layered.expect("layered settings");
        assert_eq!(layered.driver, Driver::Sqlite);
        assert_eq!(layered.log_level, "warn");
        assert_eq!(layered.insert_timeout(), Some(Duration::from_millis(250)));

        let bad = tmp.path().join("bad.toml");
        std::fs::write(&bad, "log_format = \"xml\"\n").expect("write");
        assert!(matches!(
            Settings::load(&bad),
            Err(StartupError::InvalidSettings(_))
        ));
    }

    #[test]
    fn settings_validation() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.insert_timeout(), None);

        settings.insert_timeout_ms = 250;
        assert_eq!(settings.insert_timeout(), Some(Duration::from_millis(250)));

        settings.log_level = "loud".to_string();
        assert!(settings.validate().is_err());

        settings.log_level = "DEBUG".to_string();
        settings.log_format = "xml".to_string();
        assert!(settings.validate().is_err());
    }
}
