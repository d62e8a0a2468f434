//! Pipeline orchestrator: an explicit finite state machine wiring query
//! generation, execution, and answer synthesis in order.
//!
//! One run owns one [`PipelineState`]; stages execute strictly
//! sequentially, each blocking on its outbound call and committing only the
//! field it owns. Concurrent runs are independent; the only shared pieces
//! are the schema cache and the client handles, all safe for concurrent use.

use crate::db::{ExecutionErrorPolicy, QueryExecutor, SqlDatabase};
use crate::llm::{AnswerSynthesizer, ChatModel, QueryGenerator, DEFAULT_TOP_K};
use crate::schema::{SchemaCache, SchemaDescription};
use crate::types::error::{AskError, Result};
use crate::types::state::{PipelineState, Stage, StageDelta, StageEvent};
use serde::Serialize;
use std::sync::Arc;

/// Terminal and intermediate states of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Init,
    QueryWritten,
    Executed,
    Answered,
    Failed,
}

impl PipelineStatus {
    /// Transition table: the stage that runs next from this state, or
    /// `None` if the state is terminal. No skip-ahead, no retry.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineStatus::Init => Some(Stage::Generate),
            PipelineStatus::QueryWritten => Some(Stage::Execute),
            PipelineStatus::Executed => Some(Stage::Synthesize),
            PipelineStatus::Answered | PipelineStatus::Failed => None,
        }
    }

    /// The state a successfully completed stage commits to.
    pub fn after(stage: Stage) -> PipelineStatus {
        match stage {
            Stage::Generate => PipelineStatus::QueryWritten,
            Stage::Execute => PipelineStatus::Executed,
            Stage::Synthesize => PipelineStatus::Answered,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_stage().is_none()
    }
}

/// Options for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Row-limit hint embedded in the generation prompt.
    pub top_k: usize,
    /// What execution does with database-level failures.
    pub on_execution_error: ExecutionErrorPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            on_execution_error: ExecutionErrorPolicy::default(),
        }
    }
}

/// Outcome of one run: final state, terminal status, the ordered stage
/// events, and the error when the run failed. Kept as a plain record so a
/// failed run's partial state stays observable.
#[derive(Debug)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub status: PipelineStatus,
    pub events: Vec<StageEvent>,
    pub error: Option<AskError>,
}

impl PipelineRun {
    pub fn answer(&self) -> Option<&str> {
        self.state.answer.as_deref()
    }

    /// Collapse into the terminal answer, surfacing the run error if any.
    pub fn into_answer(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.state.answer.ok_or_else(|| {
            AskError::SynthesisError("run ended without an answer".to_string())
        })
    }
}

/// The three-stage pipeline over one selected database.
pub struct Pipeline {
    db: Arc<dyn SqlDatabase>,
    schema: Arc<SchemaCache>,
    generator: QueryGenerator,
    executor: QueryExecutor,
    synthesizer: AnswerSynthesizer,
}

impl Pipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        db: Arc<dyn SqlDatabase>,
        schema: Arc<SchemaCache>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            generator: QueryGenerator::new(model.clone()).with_top_k(options.top_k),
            executor: QueryExecutor::new(db.clone()).with_policy(options.on_execution_error),
            synthesizer: AnswerSynthesizer::new(model),
            db,
            schema,
        }
    }

    /// Run the pipeline to a terminal state.
    pub async fn run(&self, question: &str) -> PipelineRun {
        self.run_with_observer(question, &mut |_| {}).await
    }

    /// Run the pipeline, handing each stage event to `observer` as it
    /// commits, so a front end can render steps progressively.
    pub async fn run_with_observer(
        &self,
        question: &str,
        observer: &mut dyn FnMut(&StageEvent),
    ) -> PipelineRun {
        let mut state = PipelineState::new(question);
        let mut events = Vec::new();

        if question.trim().is_empty() {
            return PipelineRun {
                state,
                status: PipelineStatus::Failed,
                events,
                error: Some(AskError::ValidationError(
                    "question must not be empty".to_string(),
                )),
            };
        }

        // Schema resolution happens before any stage: a dead connection
        // fails the run without entering the state machine.
        let schema = match self.schema.describe(self.db.as_ref()).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(error = %e, "schema description unavailable");
                return PipelineRun {
                    state,
                    status: PipelineStatus::Failed,
                    events,
                    error: Some(e),
                };
            }
        };

        let mut status = PipelineStatus::Init;
        while let Some(stage) = status.next_stage() {
            match self.run_stage(stage, &mut state, &schema).await {
                Ok(delta) => {
                    status = PipelineStatus::after(stage);
                    tracing::info!(stage = %stage, status = ?status, "stage completed");
                    let event = StageEvent::now(stage, delta);
                    observer(&event);
                    events.push(event);
                }
                Err(e) => {
                    tracing::error!(stage = %stage, error = %e, "stage failed");
                    return PipelineRun {
                        state,
                        status: PipelineStatus::Failed,
                        events,
                        error: Some(e),
                    };
                }
            }
        }

        PipelineRun {
            state,
            status,
            events,
            error: None,
        }
    }

    /// Execute one stage against the state, committing only the field the
    /// stage owns and returning that delta.
    async fn run_stage(
        &self,
        stage: Stage,
        state: &mut PipelineState,
        schema: &SchemaDescription,
    ) -> Result<StageDelta> {
        match stage {
            Stage::Generate => {
                let query = self.generator.generate(&state.question, schema).await?;
                state.query = Some(query.clone());
                Ok(StageDelta::Query { query })
            }
            Stage::Execute => {
                let query = state.query.as_deref().ok_or_else(|| {
                    AskError::ValidationError("no query written before execution".to_string())
                })?;
                let result = self.executor.execute(query).await?;
                state.result = Some(result.clone());
                Ok(StageDelta::Result { result })
            }
            Stage::Synthesize => {
                let (query, result) = match (state.query.as_deref(), state.result.as_deref()) {
                    (Some(query), Some(result)) => (query, result),
                    _ => {
                        return Err(AskError::ValidationError(
                            "no result available before synthesis".to_string(),
                        ))
                    }
                };
                let answer = self
                    .synthesizer
                    .synthesize(&state.question, query, result)
                    .await?;
                state.answer = Some(answer.clone());
                Ok(StageDelta::Answer { answer })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_is_strictly_sequential() {
        assert_eq!(PipelineStatus::Init.next_stage(), Some(Stage::Generate));
        assert_eq!(
            PipelineStatus::QueryWritten.next_stage(),
            Some(Stage::Execute)
        );
        assert_eq!(
            PipelineStatus::Executed.next_stage(),
            Some(Stage::Synthesize)
        );
        assert_eq!(PipelineStatus::Answered.next_stage(), None);
        assert_eq!(PipelineStatus::Failed.next_stage(), None);
    }

    #[test]
    fn test_stage_completion_states() {
        assert_eq!(
            PipelineStatus::after(Stage::Generate),
            PipelineStatus::QueryWritten
        );
        assert_eq!(
            PipelineStatus::after(Stage::Execute),
            PipelineStatus::Executed
        );
        assert_eq!(
            PipelineStatus::after(Stage::Synthesize),
            PipelineStatus::Answered
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineStatus::Answered.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(!PipelineStatus::Init.is_terminal());
        assert!(!PipelineStatus::QueryWritten.is_terminal());
        assert!(!PipelineStatus::Executed.is_terminal());
    }
}
