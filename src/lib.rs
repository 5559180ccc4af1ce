//! squid-db-log - Squid logfile daemon backed by a relational table
//!
//! Squid writes one command per line to the daemon's stdin; every `L`
//! (append) line becomes one row. Bad records are logged and skipped, only
//! startup problems stop the process.
//!
//! The table is created by the operator, for MySQL along these lines:
//!
//! ```sql
//! CREATE TABLE access_log (
//!     id                   INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY,
//!     time_since_epoch     DECIMAL(15,3),
//!     response_time        INTEGER,
//!     client_src_ip_addr   CHAR(15),
//!     squid_request_status VARCHAR(20),
//!     http_status_code     VARCHAR(10),
//!     reply_size           INTEGER,
//!     request_method       VARCHAR(20),
//!     request_url          VARCHAR(1000),
//!     username             VARCHAR(20),
//!     squid_hier_status    VARCHAR(20),
//!     server_ip_addr       CHAR(15),
//!     mime_type            VARCHAR(50)
//! );
//! ```

pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod protocol;

pub use config::{ConnectionConfig, Driver, Settings};
pub use daemon::serve;
pub use error::{RecordError, StartupError};
pub use protocol::SessionStats;
