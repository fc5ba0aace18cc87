//! Database access module
//!
//! Connection pooling over bb8 with a tokio-postgres manager, plus the
//! query executor that owns the acquire/run/release lifecycle.

pub mod executor;
pub mod manager;
pub mod pool;

pub use executor::{BindValue, QueryExecutor, QueryResult};
pub use manager::{PgConnectionConfig, PgConnectionManager};
pub use pool::{ConnectionPool, PoolError, PoolStats};

// Re-export common types for convenience
pub use bb8::{Pool, PooledConnection};
