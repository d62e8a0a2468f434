//! Core types: errors, pipeline state, stage events.

pub mod error;
pub mod state;

pub use error::{AskError, Result};
pub use state::{PipelineState, Stage, StageDelta, StageEvent};
