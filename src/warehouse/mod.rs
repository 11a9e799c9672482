//! Warehouse abstraction layer for cortex-lens.
//!
//! Provides a trait-based interface for statement execution, so the views
//! can run against the Snowflake SQL API or an in-memory mock.

mod mock;
mod snowflake;
mod statement;
mod types;

pub use mock::{FailingWarehouse, MockWarehouse};
pub use snowflake::SnowflakeClient;
pub use statement::{name_literal, validate_identifier, Binding, Statement, WireBinding};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Creates a warehouse client for the given configuration.
///
/// The returned handle is owned by the caller and must be closed at shutdown.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn WarehouseClient>> {
    let client = SnowflakeClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for warehouse clients.
///
/// Implementations only read: every statement the views issue is a SELECT
/// over existing tables, stages and search services.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Executes a parameterized statement and returns the results.
    async fn execute(&self, statement: &Statement) -> Result<QueryResult>;

    /// Ends the client's lifecycle. Further calls to `execute` fail.
    async fn close(&self) -> Result<()>;
}
