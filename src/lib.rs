//! askdb - natural-language questions answered from a SQL database.
//!
//! A question flows through a fixed three-stage pipeline: a chat model
//! writes a SQL query grounded in the selected database's schema, the
//! database executes it, and the model summarizes the result as a
//! natural-language answer. Each stage commits an incremental delta an
//! observer can render as it arrives.

pub mod config;
pub mod db;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod types;

// Re-export main types
pub use config::{Config, DatabaseConfig};
pub use db::{Database, ExecutionErrorPolicy, QueryExecutor, SqlDatabase};
pub use llm::{AnswerSynthesizer, ChatModel, HttpChatModel, QueryGenerator};
pub use pipeline::{Pipeline, PipelineOptions, PipelineRun, PipelineStatus};
pub use schema::{SchemaCache, SchemaDescription};
pub use types::{AskError, PipelineState, Result, Stage, StageDelta, StageEvent};
