use crate::error::GatewayError;
use crate::health::DatabaseHealth;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success body for the tenant query endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub message: String,
    pub data: Value,
    pub endpoint: String,
    pub status: String,
}

impl EndpointResponse {
    pub fn success(tenant: &str, endpoint: &str, data: Value) -> Self {
        Self {
            message: format!("Hello from {} {} endpoint", tenant, endpoint),
            data,
            endpoint: endpoint.to_string(),
            status: "success".to_string(),
        }
    }
}

/// Failure body shared by every endpoint
///
/// Always well-formed JSON; a failed request never surfaces as a bare
/// stack trace or a reset connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn from_error(err: &GatewayError, tenant: &str) -> Self {
        Self {
            error: err.kind().to_string(),
            details: err.to_string(),
            tenant: tenant.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Body for the process-level health probe; reports liveness only and
/// never touches the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy(tenant: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            tenant: tenant.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Body for the database health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbHealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
}

impl DbHealthResponse {
    pub fn healthy(tenant: &str, data: Option<Value>, database: DatabaseHealth) -> Self {
        Self {
            status: "database_healthy".to_string(),
            data,
            database: Some(database),
            error: None,
            tenant: tenant.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn unhealthy(tenant: &str, err: &GatewayError) -> Self {
        Self {
            status: "database_unhealthy".to_string(),
            data: None,
            database: None,
            error: Some(err.to_string()),
            tenant: tenant.to_string(),
            timestamp: Utc::now(),
        }
    }
}
