use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for tenantd
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub server: ServerConfig,
    pub tenant: TenantConfig,
    pub logging: LoggingConfig,
}

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

/// Connection pool sizing and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    /// Upper bound on waiting for a free connection, not on query execution.
    pub connection_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Listener configuration for the two HTTP surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub public_port: u16,
    pub internal_port: u16,
}

/// Tenant identity carried through responses and query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    pub name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            pool: PoolConfig::default(),
            server: ServerConfig::default(),
            tenant: TenantConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "app".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 1,
            connection_timeout_secs: 30,
            idle_timeout_secs: 600,    // 10 minutes
            max_lifetime_secs: 1800,   // 30 minutes
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            public_port: 8080,
            internal_port: 9090,
        }
    }
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(), // pretty, json, compact
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. config.toml file (if exists)
    /// 3. Environment variables (TENANTD_* and legacy flat names)
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&std::env::current_dir()?)
    }

    /// Load configuration from a specific directory
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        // Try to load from config.toml file
        let config_file = dir.join("config.toml");
        if config_file.exists() {
            builder = builder.add_source(File::from(config_file));
        }

        // Add environment variables with TENANTD_ prefix
        // (TENANTD_DATABASE_HOST maps to database.host)
        builder = builder.add_source(
            Environment::with_prefix("TENANTD")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        // Missing sections and fields fall back to defaults via serde
        let mut result = config
            .try_deserialize::<Config>()
            .context("Failed to deserialize configuration")?;

        // Legacy flat variable names (DB_HOST, TENANT_NAME, ...) win last
        result.merge_env_vars()?;

        Ok(result)
    }

    /// Copy with the database password masked, for `check-config` output.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.database.password.is_empty() {
            copy.database.password = "********".to_string();
        }
        copy
    }

    /// Create a new Config for testing
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            database: DatabaseConfig {
                host: "127.0.0.1".to_string(),
                port: 5432,
                dbname: "test".to_string(),
                user: "test".to_string(),
                password: "test".to_string(),
            },
            pool: PoolConfig {
                max_size: 5,
                min_idle: 1,
                connection_timeout_secs: 10,
                idle_timeout_secs: 60,
                max_lifetime_secs: 300,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                public_port: 0, // Use any available port
                internal_port: 0,
            },
            tenant: TenantConfig {
                name: "test-tenant".to_string(),
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Merge flat environment variables for backward compatibility
    fn merge_env_vars(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("DB_HOST") {
            self.database.host = host;
        }
        if let Ok(port_str) = std::env::var("DB_PORT") {
            self.database.port = port_str.parse().unwrap_or(5432);
        }
        if let Ok(dbname) = std::env::var("DB_NAME") {
            self.database.dbname = dbname;
        }
        if let Ok(user) = std::env::var("DB_USER") {
            self.database.user = user;
        }
        if let Ok(password) = std::env::var("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Ok(name) = std::env::var("TENANT_NAME") {
            self.tenant.name = name;
        }
        if let Ok(port_str) = std::env::var("PUBLIC_PORT") {
            self.server.public_port = port_str.parse().unwrap_or(8080);
        }
        if let Ok(port_str) = std::env::var("INTERNAL_PORT") {
            self.server.internal_port = port_str.parse().unwrap_or(9090);
        }

        Ok(())
    }
}
