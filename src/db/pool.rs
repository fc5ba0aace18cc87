//! Connection pool for PostgreSQL
//!
//! A thin interface over a bb8 pool: bounded size, acquisition timeout,
//! idle reaping, and stats for health reporting. Release is the drop of
//! the pooled-connection guard, so a connection cannot leak past the
//! scope that acquired it.

use crate::config::{DatabaseConfig, PoolConfig};
use crate::db::manager::{PgConnectionConfig, PgConnectionManager};
use bb8::{Pool, PooledConnection, RunError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Errors that can occur with the connection pool
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("pool configuration error: {0}")]
    Configuration(String),

    #[error("failed to establish a connection: {0}")]
    Connect(String),

    #[error("timed out waiting for a connection")]
    Timeout,
}

/// Connection pool statistics for health reporting and leak checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Current number of open connections
    pub size: u32,
    /// Connections sitting idle in the pool
    pub idle: u32,
    /// Connections currently leased out
    pub active: u32,
    /// Configured upper bound
    pub max_size: u32,
}

/// Bounded pool of reusable PostgreSQL connections
///
/// Cloning is cheap and shares the underlying pool. Connections are not
/// opened eagerly; the first acquisition (or the min-idle replenisher)
/// establishes them, so the process can start while the database is down.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: Pool<PgConnectionManager>,
    config: PoolConfig,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration
    pub fn new(
        connection_config: PgConnectionConfig,
        pool_config: PoolConfig,
    ) -> Result<Self, PoolError> {
        if pool_config.max_size == 0 {
            return Err(PoolError::Configuration(
                "max_size must be at least 1".to_string(),
            ));
        }

        info!(
            "Creating connection pool with max_size: {}, min_idle: {}",
            pool_config.max_size, pool_config.min_idle
        );

        let manager = PgConnectionManager::new(connection_config);

        let pool = Pool::builder()
            .max_size(pool_config.max_size)
            .min_idle(Some(pool_config.min_idle))
            .connection_timeout(Duration::from_secs(pool_config.connection_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(pool_config.idle_timeout_secs)))
            .max_lifetime(Some(Duration::from_secs(pool_config.max_lifetime_secs)))
            .test_on_check_out(true)
            .build_unchecked(manager);

        Ok(Self {
            pool,
            config: pool_config,
        })
    }

    /// Build a pool straight from the configuration tree
    pub fn from_config(
        database: &DatabaseConfig,
        pool_config: &PoolConfig,
    ) -> Result<Self, PoolError> {
        let connection_config = PgConnectionConfig::new(
            database.host.clone(),
            database.port,
            database.dbname.clone(),
            database.user.clone(),
            database.password.clone(),
        )
        .with_connect_timeout(pool_config.connection_timeout_secs);

        Self::new(connection_config, pool_config.clone())
    }

    /// Lease a connection from the pool
    ///
    /// Blocks until a connection is free or the acquisition timeout
    /// elapses. The returned guard hands the connection back on drop.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
    ) -> Result<PooledConnection<'_, PgConnectionManager>, PoolError> {
        debug!("Acquiring connection from pool");

        match self.pool.get().await {
            Ok(conn) => {
                debug!("Acquired connection from pool");
                Ok(conn)
            }
            Err(RunError::User(e)) => {
                error!("Connection could not be established: {}", e);
                Err(PoolError::Connect(e.to_string()))
            }
            Err(RunError::TimedOut) => {
                warn!("Connection pool acquisition timed out");
                Err(PoolError::Timeout)
            }
        }
    }

    /// Current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            size: state.connections,
            idle: state.idle_connections,
            active: state.connections - state.idle_connections,
            max_size: self.config.max_size,
        }
    }

    /// Check whether the pool can produce a working connection
    ///
    /// Acquires a connection and runs a trivial query.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, PoolError> {
        match self.acquire().await {
            Ok(conn) => match conn.simple_query("SELECT 1").await {
                Ok(_) => Ok(true),
                Err(e) => {
                    warn!("Pool health check query failed: {}", e);
                    Ok(false)
                }
            },
            Err(e) => {
                warn!("Could not acquire connection for health check: {}", e);
                Ok(false)
            }
        }
    }

    /// The pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Graceful shutdown - close all connections
    ///
    /// bb8 has no explicit drain; dropping the pool closes connections as
    /// they are returned. Called once at process teardown.
    #[instrument(skip(self))]
    pub async fn close(self) {
        info!("Shutting down connection pool");
        drop(self.pool);
        info!("Connection pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    fn unreachable_connection_config() -> PgConnectionConfig {
        // Port 1 is closed; acquisition fails fast with connection refused
        PgConnectionConfig::new(
            "127.0.0.1".to_string(),
            1,
            "app".to_string(),
            "postgres".to_string(),
            String::new(),
        )
        .with_connect_timeout(1)
    }

    fn small_pool_config() -> PoolConfig {
        PoolConfig {
            max_size: 2,
            min_idle: 0,
            connection_timeout_secs: 1,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300,
        }
    }

    #[test]
    fn test_zero_max_size_is_rejected() {
        let result = ConnectionPool::new(
            unreachable_connection_config(),
            PoolConfig {
                max_size: 0,
                ..small_pool_config()
            },
        );

        assert!(matches!(result, Err(PoolError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_pool_creation_does_not_require_database() {
        // Creation is lazy; only acquisition touches the network
        let pool =
            ConnectionPool::new(unreachable_connection_config(), small_pool_config()).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.max_size, 2);
        assert_eq!(stats.active, 0);
    }

    #[tokio::test]
    async fn test_acquire_from_unreachable_database_fails() {
        let pool =
            ConnectionPool::new(unreachable_connection_config(), small_pool_config()).unwrap();

        let result = pool.acquire().await;
        assert!(matches!(
            result,
            Err(PoolError::Connect(_)) | Err(PoolError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_health_check_reports_unhealthy_without_database() {
        let pool =
            ConnectionPool::new(unreachable_connection_config(), small_pool_config()).unwrap();

        let healthy = pool.health_check().await.unwrap();
        assert!(!healthy);
    }

    #[test]
    fn test_pool_stats_fields() {
        let stats = PoolStats {
            size: 5,
            idle: 3,
            active: 2,
            max_size: 10,
        };

        assert_eq!(stats.size, stats.idle + stats.active);
        assert!(stats.size <= stats.max_size);
    }
}
