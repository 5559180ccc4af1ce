//! Database module

pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use sqlx::any::{AnyConnectOptions, AnyStatement};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{AnyConnection, ConnectOptions, Connection, Executor, Statement};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, Driver, Settings};
use crate::error::{RecordError, StartupError};

/// One access log line as sent by Squid, split into its values.
///
/// Not validated on construction: a record with the wrong number of values
/// is rejected by [`AccessLogStore::append`] so the caller can still log
/// what arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRecord {
    values: Vec<String>,
}

impl AppendRecord {
    /// Split a payload on runs of whitespace. The empty token left where the
    /// command tag was never shows up as a value.
    pub fn parse(payload: &str) -> Self {
        let values = payload.split_whitespace().map(str::to_string).collect();
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == schema::FIELD_COUNT
    }
}

/// Open a single connection to the configured store.
pub async fn connect(config: &ConnectionConfig, driver: Driver) -> Result<AnyConnection, StartupError> {
    sqlx::any::install_default_drivers();

    let target = config.describe(driver);
    let failed = |source: sqlx::Error| StartupError::ConnectionFailed {
        target: target.clone(),
        source,
    };

    let options = match driver {
        Driver::Mysql => {
            let mut mysql = MySqlConnectOptions::new()
                .host(&config.host)
                .username(&config.user)
                .database(&config.database);
            if let Some(port) = config.port {
                mysql = mysql.port(port);
            }
            if let Some(password) = &config.password {
                mysql = mysql.password(password);
            }
            AnyConnectOptions::from_url(&mysql.to_url_lossy()).map_err(failed)?
        }
        Driver::Sqlite => {
            AnyConnectOptions::from_str(&format!("sqlite:{}", config.database)).map_err(failed)?
        }
    };

    let conn = AnyConnection::connect_with(&options).await.map_err(failed)?;
    info!(database = %target, "Connected to database");
    Ok(conn)
}

/// The daemon's only connection together with its prepared insert.
pub struct AccessLogStore {
    conn: AnyConnection,
    insert: AnyStatement<'static>,
    table: String,
    insert_timeout: Option<Duration>,
}

impl AccessLogStore {
    /// Check that `table` exposes every access log column, then prepare the
    /// insert statement that every append reuses.
    pub async fn open(
        mut conn: AnyConnection,
        table: &str,
        insert_timeout: Option<Duration>,
    ) -> Result<Self, StartupError> {
        let existing: i64 = sqlx::query_scalar(&schema::probe_query(table))
            .fetch_one(&mut conn)
            .await
            .map_err(|source| StartupError::SchemaMismatch {
                table: table.to_string(),
                source,
            })?;
        debug!(table, has_rows = existing > 0, "Table columns verified");

        let sql = schema::insert_statement(table);
        let prepared = (&mut conn)
            .prepare(&sql)
            .await
            .map_err(|source| StartupError::StatementPrepareFailed {
                table: table.to_string(),
                source,
            })?;
        let insert = Statement::to_owned(&prepared);
        info!(table, "Insert statement prepared");

        Ok(Self {
            conn,
            insert,
            table: table.to_string(),
            insert_timeout,
        })
    }

    /// Connect, validate and prepare in one go.
    pub async fn connect(config: &ConnectionConfig, settings: &Settings) -> Result<Self, StartupError> {
        let conn = connect(config, settings.driver).await?;
        Self::open(conn, &config.table, settings.insert_timeout()).await
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Insert one record. Exactly one attempt; any failure comes back as a
    /// value and leaves the store usable for the next record.
    pub async fn append(&mut self, record: &AppendRecord) -> Result<u64, RecordError> {
        if !record.is_complete() {
            return Err(RecordError::Malformed {
                expected: schema::FIELD_COUNT,
                actual: record.values().len(),
            });
        }

        let mut query = self.insert.query();
        for value in record.values() {
            query = query.bind(value.clone());
        }

        let result = match self.insert_timeout {
            Some(limit) => tokio::time::timeout(limit, query.execute(&mut self.conn))
                .await
                .map_err(|_| RecordError::TimedOut(limit))?,
            None => query.execute(&mut self.conn).await,
        }?;

        Ok(result.rows_affected())
    }

    /// Release the connection.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            warn!(error = %e, "Error while closing database connection");
        } else {
            info!("Disconnected from database");
        }
    }
}
