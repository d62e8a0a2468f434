//! Live database connection over sqlx.
//!
//! One `Database` wraps a pooled connection to a single configured
//! database. Query results serialize as a Python-style list of tuples
//! (`[(42,)]`), the text format the synthesis prompt consumes.

use crate::config::DatabaseConfig;
use crate::db::SqlDatabase;
use crate::types::error::{AskError, Result};
use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::sync::Once;

static INSTALL_DRIVERS: Once = Once::new();

/// SQL dialect, derived from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
}

impl Dialect {
    pub fn from_scheme(scheme: &str) -> Result<Self> {
        match scheme {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(AskError::ConfigError(format!(
                "Unsupported database scheme: {}",
                other
            ))),
        }
    }

    /// Dialect name as embedded in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Introspection query listing every (table, column, type) in order.
    fn table_info_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT table_name, column_name, data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' \
                 ORDER BY table_name, ordinal_position"
            }
            Dialect::Mysql => {
                "SELECT table_name, column_name, data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() \
                 ORDER BY table_name, ordinal_position"
            }
            Dialect::Sqlite => {
                "SELECT m.name AS table_name, p.name AS column_name, p.type AS data_type \
                 FROM sqlite_master m \
                 JOIN pragma_table_info(m.name) p \
                 WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
                 ORDER BY m.name, p.cid"
            }
        }
    }
}

/// A single decoded result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Bool(true) => "True".to_string(),
            Cell::Bool(false) => "False".to_string(),
            Cell::Text(v) => format!("'{}'", v),
            Cell::Null => "None".to_string(),
        }
    }
}

/// Render rows as a list of tuples: `[(42,)]`, `[(1, 'a'), (2, 'b')]`.
/// An empty row set renders as the empty string.
pub(crate) fn render_rows(rows: &[Vec<Cell>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(Cell::render).collect();
            // single-element tuples keep the trailing comma
            if cells.len() == 1 {
                format!("({},)", cells[0])
            } else {
                format!("({})", cells.join(", "))
            }
        })
        .collect();

    format!("[{}]", tuples.join(", "))
}

/// Group introspected (table, column, type) rows into CREATE TABLE-style
/// text for prompt grounding. Input must be ordered by table then position.
pub(crate) fn render_table_info(columns: &[(String, String, String)]) -> String {
    let mut tables: Vec<String> = Vec::new();
    let mut current: Option<(&str, Vec<String>)> = None;

    for (table, column, data_type) in columns {
        match &mut current {
            Some((name, cols)) if *name == table.as_str() => {
                cols.push(format!("\t{} {}", column, data_type));
            }
            _ => {
                if let Some((name, cols)) = current.take() {
                    tables.push(format!("CREATE TABLE {} (\n{}\n)", name, cols.join(",\n")));
                }
                current = Some((table, vec![format!("\t{} {}", column, data_type)]));
            }
        }
    }
    if let Some((name, cols)) = current {
        tables.push(format!("CREATE TABLE {} (\n{}\n)", name, cols.join(",\n")));
    }

    tables.join("\n\n")
}

/// Pooled connection to one configured database.
pub struct Database {
    name: String,
    dialect: Dialect,
    pool: AnyPool,
}

impl Database {
    /// Connect to a configured database.
    ///
    /// # Errors
    ///
    /// `ConnectionError` if the database is unreachable; `ConfigError` for
    /// an unsupported scheme.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let dialect = Dialect::from_scheme(&config.scheme)?;
        let url = config.url();

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| {
                AskError::ConnectionError(format!(
                    "Failed to connect to '{}': {}",
                    config.name, e
                ))
            })?;

        tracing::info!(database = %config.name, dialect = dialect.as_str(), "connected");

        Ok(Self {
            name: config.name.clone(),
            dialect,
            pool,
        })
    }

    fn decode_cell(row: &AnyRow, idx: usize) -> Cell {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Cell::Int(v);
        }
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Cell::Float(v);
        }
        if let Ok(v) = row.try_get::<bool, _>(idx) {
            return Cell::Bool(v);
        }
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Cell::Text(v);
        }
        Cell::Null
    }

    fn decode_row(row: &AnyRow) -> Vec<Cell> {
        (0..row.columns().len())
            .map(|idx| Self::decode_cell(row, idx))
            .collect()
    }
}

#[async_trait]
impl SqlDatabase for Database {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect(&self) -> &str {
        self.dialect.as_str()
    }

    async fn table_info(&self) -> Result<String> {
        let rows = sqlx::query(self.dialect.table_info_sql())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AskError::ConnectionError(format!("Schema introspection failed: {}", e))
            })?;

        let columns: Vec<(String, String, String)> = rows
            .iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>(0)?,
                    row.try_get::<String, _>(1)?,
                    row.try_get::<String, _>(2)?,
                ))
            })
            .collect::<std::result::Result<_, sqlx::Error>>()
            .map_err(|e| {
                AskError::ConnectionError(format!("Schema introspection failed: {}", e))
            })?;

        Ok(render_table_info(&columns))
    }

    async fn run_query(&self, sql: &str) -> Result<String> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AskError::ExecutionError(e.to_string()))?;

        let decoded: Vec<Vec<Cell>> = rows.iter().map(Self::decode_row).collect();
        Ok(render_rows(&decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_scheme() {
        assert_eq!(Dialect::from_scheme("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(
            Dialect::from_scheme("postgresql").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(Dialect::from_scheme("mysql").unwrap(), Dialect::Mysql);
        assert_eq!(Dialect::from_scheme("sqlite").unwrap(), Dialect::Sqlite);
        assert!(Dialect::from_scheme("mongodb").is_err());
    }

    #[test]
    fn test_render_single_int_row() {
        let rows = vec![vec![Cell::Int(42)]];
        assert_eq!(render_rows(&rows), "[(42,)]");
    }

    #[test]
    fn test_render_mixed_rows() {
        let rows = vec![
            vec![Cell::Int(1), Cell::Text("Alice".to_string())],
            vec![Cell::Int(2), Cell::Null],
        ];
        assert_eq!(render_rows(&rows), "[(1, 'Alice'), (2, None)]");
    }

    #[test]
    fn test_render_bools_and_floats() {
        let rows = vec![vec![Cell::Bool(true), Cell::Float(2.5)]];
        assert_eq!(render_rows(&rows), "[(True, 2.5)]");
    }

    #[test]
    fn test_render_empty_result_is_empty_string() {
        assert_eq!(render_rows(&[]), "");
    }

    #[test]
    fn test_render_table_info_groups_by_table() {
        let columns = vec![
            ("customers".to_string(), "id".to_string(), "integer".to_string()),
            ("customers".to_string(), "name".to_string(), "text".to_string()),
            ("orders".to_string(), "id".to_string(), "integer".to_string()),
        ];
        let info = render_table_info(&columns);
        assert_eq!(
            info,
            "CREATE TABLE customers (\n\tid integer,\n\tname text\n)\n\n\
             CREATE TABLE orders (\n\tid integer\n)"
        );
    }

    #[test]
    fn test_render_table_info_empty() {
        assert_eq!(render_table_info(&[]), "");
    }
}
