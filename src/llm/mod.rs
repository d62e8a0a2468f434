//! Model boundary: chat client, query generation, answer synthesis.

pub mod client;
pub mod generator;
pub mod synthesizer;

pub use client::{ChatModel, HttpChatModel, Provider};
pub use generator::{query_output_schema, QueryGenerator, QueryOutput, DEFAULT_TOP_K};
pub use synthesizer::AnswerSynthesizer;
