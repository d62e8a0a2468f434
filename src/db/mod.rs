//! Database boundary: the `SqlDatabase` seam, the live sqlx-backed
//! implementation, and the pipeline's query executor.

pub mod database;
pub mod executor;

pub use database::{Database, Dialect};
pub use executor::{ExecutionErrorPolicy, QueryExecutor};

use crate::types::error::Result;
use async_trait::async_trait;

/// Opaque database boundary: SQL text in, textual result or error out,
/// plus the metadata the schema provider needs. The live implementation is
/// [`Database`]; tests substitute fakes.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// Selection identity, used as the schema-cache key.
    fn name(&self) -> &str;

    /// Dialect name for prompt grounding, e.g. "postgresql".
    fn dialect(&self) -> &str;

    /// Textual description of the tables and columns, computed from a live
    /// connection. Failures are `ConnectionError`.
    async fn table_info(&self) -> Result<String>;

    /// Execute a query exactly as given and serialize the result set.
    /// Failures are `ExecutionError`.
    async fn run_query(&self, sql: &str) -> Result<String>;
}
