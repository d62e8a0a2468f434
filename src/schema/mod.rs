//! Schema descriptions and the per-database schema cache.

use crate::db::SqlDatabase;
use crate::types::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Read-only snapshot of a database's dialect and table metadata, used to
/// ground query generation. Treated as immutable for the lifetime of one
/// pipeline run; there is no schema-change detection.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescription {
    /// Dialect name, e.g. "postgresql".
    pub dialect: String,
    /// CREATE TABLE-style description of tables and columns.
    pub table_info: String,
}

/// Process-wide cache of schema descriptions, keyed by selected-database
/// identity. Injected where needed rather than held as global state.
///
/// Recomputation uses invalidate-and-recompute semantics: concurrent
/// describers may race, last writer wins. Selection changes are rare and
/// user-driven, so that is acceptable.
#[derive(Default)]
pub struct SchemaCache {
    inner: RwLock<HashMap<String, Arc<SchemaDescription>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached description for `db`, computing it from the live
    /// connection on a miss.
    ///
    /// # Errors
    ///
    /// `ConnectionError` if introspection fails; nothing is cached then.
    pub async fn describe(&self, db: &dyn SqlDatabase) -> Result<Arc<SchemaDescription>> {
        if let Some(cached) = self.inner.read().unwrap().get(db.name()) {
            return Ok(cached.clone());
        }

        tracing::info!(database = db.name(), "computing schema description");
        let description = Arc::new(SchemaDescription {
            dialect: db.dialect().to_string(),
            table_info: db.table_info().await?,
        });

        self.inner
            .write()
            .unwrap()
            .insert(db.name().to_string(), description.clone());

        Ok(description)
    }

    /// Drop the cached description for one database, forcing recomputation
    /// on the next describe. Called when the selection changes.
    pub fn invalidate(&self, name: &str) {
        self.inner.write().unwrap().remove(name);
    }

    /// Drop every cached description.
    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDb {
        name: String,
        info: String,
        calls: AtomicUsize,
    }

    impl CountingDb {
        fn new(name: &str, info: &str) -> Self {
            Self {
                name: name.to_string(),
                info: info.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SqlDatabase for CountingDb {
        fn name(&self) -> &str {
            &self.name
        }

        fn dialect(&self) -> &str {
            "postgresql"
        }

        async fn table_info(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.info.clone())
        }

        async fn run_query(&self, _sql: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_describe_computes_once() {
        let cache = SchemaCache::new();
        let db = CountingDb::new("netflix", "CREATE TABLE shows (...)");

        let first = cache.describe(&db).await.unwrap();
        let second = cache.describe(&db).await.unwrap();

        assert_eq!(first.table_info, second.table_info);
        assert_eq!(db.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = SchemaCache::new();
        let db = CountingDb::new("netflix", "CREATE TABLE shows (...)");

        cache.describe(&db).await.unwrap();
        cache.invalidate("netflix");
        cache.describe(&db).await.unwrap();

        assert_eq!(db.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_switching_databases_reads_distinct_entries() {
        let cache = SchemaCache::new();
        let netflix = CountingDb::new("netflix", "CREATE TABLE shows (...)");
        let payments = CountingDb::new("payments", "CREATE TABLE invoices (...)");

        let first = cache.describe(&netflix).await.unwrap();
        let second = cache.describe(&payments).await.unwrap();

        assert!(first.table_info.contains("shows"));
        assert!(second.table_info.contains("invoices"));
    }
}
