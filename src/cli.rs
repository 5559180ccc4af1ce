use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "Squid logfile daemon writing access log records to a database",
    long_about = "Reads Squid logfile daemon commands on stdin and inserts every \
                  access log record into a relational table. Point Squid at it with \
                  `logfile_daemon` and `access_log daemon:/host/database/table/user/password`."
)]
pub struct CliArguments {
    /// Connection string: host/database/table/user/password
    ///
    /// Empty components use defaults (localhost, squid_log, access_log, squid, no password).
    /// Example: /dbhost/squid_log/access_log/squid/secret
    pub connection: String,

    /// Daemon settings file (optional)
    #[arg(short = 's', long, env = "SQUID_DB_LOG_SETTINGS", default_value = "squid-db-log.toml")]
    pub settings: PathBuf,
}
