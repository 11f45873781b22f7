//! PostgreSQL client implementation
//!
//! This module provides the pooled client the adapter runs its statements on.

use crate::config::{redact_dsn, DatabaseConfig};
use crate::domain::{Result, ScanfeedError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// PostgreSQL client for scanfeed
///
/// Every statement runs on a pooled connection after
/// `SET statement_timeout`, so long scan queries are bounded by
/// `database.statement_timeout_seconds`.
pub struct PostgreSQLClient {
    pool: Pool,
    config: DatabaseConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string does not parse, the TLS
    /// connector cannot be built, or the pool cannot be created.
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                ScanfeedError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                let required = matches!(mode, "require" | "verify-ca" | "verify-full");
                pg_config.ssl_mode(if required {
                    SslMode::Require
                } else {
                    SslMode::Prefer
                });
                Manager::from_config(pg_config, tls_connector(mode)?, manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| ScanfeedError::Database(format!("Failed to create connection pool: {e}")))?;

        tracing::debug!(
            dsn = %redact_dsn(&config.connection_string),
            ssl_mode = %config.ssl_mode,
            max_connections = config.max_connections,
            "PostgreSQL pool created"
        );

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    ///
    /// Attempts to get a connection from the pool and execute a simple query.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| ScanfeedError::Database(format!("Connection test failed: {e}")))?;

        tracing::info!(dsn = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ScanfeedError::Database(format!("Failed to get connection from pool: {e}")))
    }

    /// Execute a query and return rows
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Query` if the query fails or times out.
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let client = self.timed_connection().await?;

        client.query(query, params).await.map_err(query_error)
    }

    /// Execute a query that returns exactly one row
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Query` if the query fails or returns no row.
    pub async fn query_one(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row> {
        let client = self.timed_connection().await?;

        client.query_one(query, params).await.map_err(query_error)
    }

    /// Execute a statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Database` if the statement fails.
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client = self.timed_connection().await?;

        client
            .execute(statement, params)
            .await
            .map_err(|e| ScanfeedError::Database(format!("Statement execution failed: {e}")))
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_dsn(&self.config.connection_string)
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }

    async fn timed_connection(&self) -> Result<deadpool_postgres::Object> {
        let client = self.get_connection().await?;

        let timeout_ms = self
            .config
            .statement_timeout_seconds
            .checked_mul(1000)
            .filter(|ms| *ms <= i32::MAX as u64)
            .ok_or_else(|| {
                ScanfeedError::Configuration(format!(
                    "database.statement_timeout_seconds is too large: {}",
                    self.config.statement_timeout_seconds
                ))
            })?;
        let timeout_query = format!("SET statement_timeout = {timeout_ms}");
        client
            .execute(&timeout_query, &[])
            .await
            .map_err(|e| ScanfeedError::Database(format!("Failed to set statement timeout: {e}")))?;

        Ok(client)
    }
}

/// TLS connector for `ssl_mode`
///
/// `require` encrypts without verifying the server, `verify-ca` checks the
/// chain but not the host name, `verify-full` checks both.
fn tls_connector(ssl_mode: &str) -> Result<postgres_native_tls::MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    match ssl_mode {
        "verify-full" => {}
        "verify-ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {
            builder.danger_accept_invalid_certs(true);
        }
    }

    let connector = builder
        .build()
        .map_err(|e| ScanfeedError::Configuration(format!("Failed to build TLS connector: {e}")))?;
    Ok(postgres_native_tls::MakeTlsConnector::new(connector))
}

fn query_error(e: tokio_postgres::Error) -> ScanfeedError {
    if e.code() == Some(&SqlState::QUERY_CANCELED) {
        ScanfeedError::Query(format!("Statement timeout exceeded: {e}"))
    } else {
        ScanfeedError::Query(format!("Query failed: {e}"))
    }
}
