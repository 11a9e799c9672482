//! Memoized reads of reference tables.
//!
//! Tables are read once per process with `SELECT * FROM <name>` and kept for
//! the lifetime of the cache. There is no invalidation: reference tables are
//! slow-changing, and a stale read within one session is accepted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::warehouse::{validate_identifier, QueryResult, Statement, WarehouseClient};

/// Table-name keyed cache of full table reads.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: RwLock<HashMap<String, Arc<QueryResult>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rows of `table`, reading them on first use.
    ///
    /// Names are case-insensitive, like unquoted warehouse identifiers.
    /// Failed reads are not cached.
    pub async fn load(
        &self,
        warehouse: &dyn WarehouseClient,
        table: &str,
    ) -> Result<Arc<QueryResult>> {
        let key = validate_identifier(table)?.to_uppercase();

        if let Some(hit) = self.entries.read().await.get(&key) {
            debug!("Table cache hit: {}", key);
            return Ok(Arc::clone(hit));
        }

        debug!("Table cache miss: {}", key);
        let result = Arc::new(
            warehouse
                .execute(&Statement::new(format!("SELECT * FROM {key}")))
                .await?,
        );

        let mut entries = self.entries.write().await;
        Ok(Arc::clone(entries.entry(key).or_insert(result)))
    }

    /// Number of cached tables.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
