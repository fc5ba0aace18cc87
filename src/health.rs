//! Health classification for the database probe
//!
//! Models the status reported by `/db-health`: probe latency plus
//! connection-pool pressure, folded into a single status.

use crate::db::pool::PoolStats;
use serde::{Deserialize, Serialize};

/// Probe latency above which the database counts as degraded
const DEGRADED_LATENCY_MS: u64 = 1_000;

/// Pool utilization (percent) above which the database counts as degraded
const DEGRADED_UTILIZATION_PERCENT: f64 = 80.0;

/// Overall status of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Connection pool pressure at probe time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolHealth {
    pub active: u32,
    pub idle: u32,
    pub max: u32,
    pub utilization_percent: f64,
}

impl ConnectionPoolHealth {
    pub fn from_stats(stats: &PoolStats) -> Self {
        let utilization_percent = if stats.max_size > 0 {
            (stats.active as f64 / stats.max_size as f64) * 100.0
        } else {
            0.0
        };

        Self {
            active: stats.active,
            idle: stats.idle,
            max: stats.max_size,
            utilization_percent,
        }
    }
}

/// Database health as reported by a successful probe query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub connection_pool: ConnectionPoolHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DatabaseHealth {
    /// Classify a successful probe by latency and pool pressure
    pub fn evaluate(latency_ms: u64, connection_pool: ConnectionPoolHealth) -> Self {
        let (status, message) = if latency_ms > DEGRADED_LATENCY_MS {
            (HealthStatus::Degraded, Some("high latency".to_string()))
        } else if connection_pool.utilization_percent > DEGRADED_UTILIZATION_PERCENT {
            (
                HealthStatus::Degraded,
                Some("high connection pool utilization".to_string()),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        Self {
            status,
            latency_ms,
            connection_pool,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_health(active: u32, max: u32) -> ConnectionPoolHealth {
        ConnectionPoolHealth::from_stats(&PoolStats {
            size: active,
            idle: 0,
            active,
            max_size: max,
        })
    }

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Healthy).unwrap();
        assert_eq!(json, "\"healthy\"");

        let json = serde_json::to_string(&HealthStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }

    #[test]
    fn test_utilization_calculation() {
        let health = pool_health(8, 10);
        assert_eq!(health.utilization_percent, 80.0);

        let empty = pool_health(0, 0);
        assert_eq!(empty.utilization_percent, 0.0);
    }

    #[test]
    fn test_evaluate_healthy() {
        let health = DatabaseHealth::evaluate(12, pool_health(1, 10));
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.message.is_none());
    }

    #[test]
    fn test_evaluate_degraded_on_latency() {
        let health = DatabaseHealth::evaluate(1_500, pool_health(1, 10));
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.message.as_deref(), Some("high latency"));
    }

    #[test]
    fn test_evaluate_degraded_on_pool_pressure() {
        let health = DatabaseHealth::evaluate(5, pool_health(9, 10));
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(
            health.message.as_deref(),
            Some("high connection pool utilization")
        );
    }
}
