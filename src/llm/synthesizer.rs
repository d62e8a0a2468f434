//! Natural-language answer synthesis from a query and its result.

use crate::llm::client::ChatModel;
use crate::types::error::{AskError, Result};
use std::sync::Arc;

/// Summarizes {question, query, result} into a natural-language answer.
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn prompt(question: &str, query: &str, result: &str) -> String {
        format!(
            "Given the following user question, corresponding SQL query, \
             and SQL result, answer the user question.\n\n\
             Question: {}\n\
             SQL Query: {}\n\
             SQL Result: {}",
            question, query, result
        )
    }

    /// Produce the final answer. The model is invoked in free-text mode and
    /// its raw response is returned.
    ///
    /// # Errors
    ///
    /// `SynthesisError` if the model call fails. There is no fallback answer.
    pub async fn synthesize(
        &self,
        question: &str,
        query: &str,
        result: &str,
    ) -> Result<String> {
        let prompt = Self::prompt(question, query, result);

        tracing::debug!("synthesizing answer");

        self.model
            .invoke_text(&prompt)
            .await
            .map_err(|e| AskError::SynthesisError(e.to_string()))
    }
}
