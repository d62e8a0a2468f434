//! Per-run pipeline state and stage events.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The single mutable record threaded through all stages of one run.
///
/// Fields are populated strictly in declaration order: `question` at entry,
/// `query` by generation, `result` by execution, `answer` by synthesis. A
/// stage never reads a field a later stage owns and never rewrites a field
/// an earlier stage committed. The state lives for one run and is discarded
/// with it.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query: None,
            result: None,
            answer: None,
        }
    }
}

/// One of the three pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate,
    Execute,
    Synthesize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Execute => "execute",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The incremental state written by one completed stage.
///
/// Serializes as exactly the field the stage owns (`{"query": …}`,
/// `{"result": …}`, `{"answer": …}`) so an observer can render each step
/// independently without the accumulated state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageDelta {
    Query { query: String },
    Result { result: String },
    Answer { answer: String },
}

impl StageDelta {
    /// The payload text, regardless of which field it is.
    pub fn text(&self) -> &str {
        match self {
            StageDelta::Query { query } => query,
            StageDelta::Result { result } => result,
            StageDelta::Answer { answer } => answer,
        }
    }
}

/// Event emitted when a stage commits its delta, keyed by stage name.
/// Consumers receive these in arrival order.
#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub delta: StageDelta,
    pub at: DateTime<Utc>,
}

impl StageEvent {
    pub fn now(stage: Stage, delta: StageDelta) -> Self {
        Self {
            stage,
            delta,
            at: Utc::now(),
        }
    }
}
