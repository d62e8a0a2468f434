//! Query execution stage.

use crate::db::SqlDatabase;
use crate::types::error::{AskError, Result};
use std::sync::Arc;

/// What to do when the database rejects or fails the generated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionErrorPolicy {
    /// Convert the error into a diagnostic `result` string and let the
    /// synthesis stage explain it. The default.
    #[default]
    Report,
    /// Fail the run with `ExecutionError`.
    Abort,
}

/// Runs the generated query exactly as given: no retries, no rewriting,
/// no row capping beyond whatever limit the query itself encodes.
pub struct QueryExecutor {
    db: Arc<dyn SqlDatabase>,
    policy: ExecutionErrorPolicy,
}

impl QueryExecutor {
    pub fn new(db: Arc<dyn SqlDatabase>) -> Self {
        Self {
            db,
            policy: ExecutionErrorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExecutionErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute `query` and return the textual result.
    ///
    /// Under [`ExecutionErrorPolicy::Report`] a database-level failure
    /// becomes a non-empty `Error: …` string so the answer stage can
    /// explain it; under `Abort` it is returned as `ExecutionError`.
    pub async fn execute(&self, query: &str) -> Result<String> {
        match self.db.run_query(query).await {
            Ok(result) => Ok(result),
            Err(e) => match self.policy {
                ExecutionErrorPolicy::Report => {
                    tracing::warn!(error = %e, "query failed; reporting as result text");
                    Ok(format!("Error: {}", e))
                }
                ExecutionErrorPolicy::Abort => match e {
                    AskError::ExecutionError(_) => Err(e),
                    other => Err(AskError::ExecutionError(other.to_string())),
                },
            },
        }
    }
}
