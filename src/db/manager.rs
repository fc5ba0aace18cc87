//! PostgreSQL connection manager for the bb8 pool
//!
//! Implements the bb8::ManageConnection trait over tokio-postgres so the
//! pool can create, validate, and discard connections.

use async_trait::async_trait;
use bb8::ManageConnection;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

/// Errors that can occur during connection management
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to establish PostgreSQL connection: {0}")]
    Establish(#[from] tokio_postgres::Error),

    #[error("connection validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the PostgreSQL connection manager
#[derive(Debug, Clone)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl PgConnectionConfig {
    pub fn new(host: String, port: u16, dbname: String, user: String, password: String) -> Self {
        Self {
            host,
            port,
            dbname,
            user,
            password,
            connect_timeout_secs: 30,
        }
    }

    /// Set the TCP connect timeout in seconds
    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config
    }
}

/// Connection manager that implements bb8::ManageConnection
///
/// Responsible for creating, validating, and retiring PostgreSQL
/// connections held by the pool.
#[derive(Debug, Clone)]
pub struct PgConnectionManager {
    config: PgConnectionConfig,
}

impl PgConnectionManager {
    pub fn new(config: PgConnectionConfig) -> Self {
        debug!(
            "Creating PostgreSQL connection manager for {}:{}",
            config.host, config.port
        );
        Self { config }
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = Client;
    type Error = ConnectionError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        debug!(
            "Opening PostgreSQL connection to {}:{}/{}",
            self.config.host, self.config.port, self.config.dbname
        );

        let (client, connection) = self.config.to_pg_config().connect(NoTls).await?;

        // The connection future drives the wire protocol; the client makes
        // no progress unless it is polled.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection terminated: {}", e);
            }
        });

        Ok(client)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| ConnectionError::ValidationFailed(e.to_string()))
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

impl fmt::Display for PgConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PgConnectionManager({}:{}/{})",
            self.config.host, self.config.port, self.config.dbname
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_creation() {
        let config = PgConnectionConfig::new(
            "localhost".to_string(),
            5432,
            "app".to_string(),
            "postgres".to_string(),
            String::new(),
        );

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "app");
        assert_eq!(config.user, "postgres");
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn test_connection_config_builder_pattern() {
        let config = PgConnectionConfig::new(
            "localhost".to_string(),
            5432,
            "app".to_string(),
            "postgres".to_string(),
            "secret".to_string(),
        )
        .with_connect_timeout(5);

        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_connection_manager_display_omits_password() {
        let config = PgConnectionConfig::new(
            "db.internal".to_string(),
            5433,
            "tenants".to_string(),
            "svc".to_string(),
            "hunter2".to_string(),
        );

        let manager = PgConnectionManager::new(config);
        let display = manager.to_string();
        assert!(display.contains("db.internal:5433/tenants"));
        assert!(!display.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_host_fails() {
        // Port 1 is never a PostgreSQL server; connect must fail, not hang
        let config = PgConnectionConfig::new(
            "127.0.0.1".to_string(),
            1,
            "app".to_string(),
            "postgres".to_string(),
            String::new(),
        )
        .with_connect_timeout(1);

        let manager = PgConnectionManager::new(config);
        let result = manager.connect().await;
        assert!(result.is_err());
    }
}
