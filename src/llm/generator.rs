//! Natural language to SQL query generation.

use crate::llm::client::ChatModel;
use crate::schema::SchemaDescription;
use crate::types::error::{AskError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 10;

/// Structured model response: exactly one `query` field. Anything else in
/// the response is a contract violation and fails generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryOutput {
    /// A syntactically valid SQL statement.
    pub query: String,
}

/// JSON Schema for [`QueryOutput`], passed to the constrained model call.
pub fn query_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Syntactically valid SQL query."
            }
        },
        "required": ["query"],
        "additionalProperties": false
    })
}

/// Writes a single SQL query for a question, grounded in the target
/// database's dialect and schema description.
pub struct QueryGenerator {
    model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl QueryGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the row-limit hint embedded in the prompt. Advisory text
    /// only; execution does not enforce it.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// System prompt grounding the model in dialect, row limit, and schema.
    fn system_prompt(&self, schema: &SchemaDescription) -> String {
        format!(
            r#"Given an input question, create a syntactically correct {dialect} query to run to help find the answer. Unless the user specifies in their question a specific number of examples they wish to obtain, always limit your query to at most {top_k} results. You can order the results by a relevant column to return the most interesting examples in the database.

Never query for all the columns from a specific table, only ask for the few relevant columns given the question.

Pay attention to use only the column names that you can see in the schema description. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.

Only use the following tables:
{table_info}"#,
            dialect = schema.dialect,
            top_k = self.top_k,
            table_info = schema.table_info,
        )
    }

    /// Generate a SQL query for `question`.
    ///
    /// The returned string is the model output unchanged: no SQL validation,
    /// no sanitization. The trust boundary is the constrained model call.
    ///
    /// # Errors
    ///
    /// `GenerationError` if the model call fails or the response does not
    /// conform to the output contract. Nothing is stored on failure.
    pub async fn generate(
        &self,
        question: &str,
        schema: &SchemaDescription,
    ) -> Result<String> {
        let system_prompt = self.system_prompt(schema);
        let user_prompt = format!("Question: {}", question);

        tracing::debug!(dialect = %schema.dialect, "generating query");

        let response = self
            .model
            .invoke_structured(&system_prompt, &user_prompt, &query_output_schema())
            .await
            .map_err(|e| AskError::GenerationError(e.to_string()))?;

        let output: QueryOutput = serde_json::from_value(response).map_err(|e| {
            AskError::GenerationError(format!("Response does not match query contract: {}", e))
        })?;

        if output.query.trim().is_empty() {
            return Err(AskError::GenerationError(
                "Model returned an empty query".to_string(),
            ));
        }

        Ok(output.query)
    }
}
