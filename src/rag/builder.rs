//! Query construction for the question-answering flow.
//!
//! A question becomes one statement with four stages: retrieve candidate
//! chunks from the search service, flatten the match list, extract answers
//! per chunk (flattened again), and rank by confidence. The search payload
//! and the question are bound parameters; only the validated service name
//! is part of the SQL text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LensError, Result};
use crate::rag::Question;
use crate::warehouse::{name_literal, validate_identifier, Statement};

/// Search column holding the chunk text.
pub const CHUNK_COLUMN: &str = "CHUNK";

/// Search column holding the source file path.
pub const PATH_COLUMN: &str = "RELATIVE_PATH";

/// Number of chunks retrieved per question.
pub const SEARCH_LIMIT: u32 = 2;

/// Output column names of the answer statement.
pub const FILE_NAME_ALIAS: &str = "FILE_NAME";
pub const CHUNK_ALIAS: &str = "CHUNK";
pub const ANSWER_ALIAS: &str = "ANSWER";
pub const SCORE_ALIAS: &str = "CONFIDENCE_SCORE";

/// Output column of the retrieve-only statement.
pub const RESULTS_ALIAS: &str = "RESULTS";

/// Payload sent to the semantic search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub columns: Vec<String>,
    pub limit: u32,
}

impl SearchRequest {
    /// Creates the request for a question, with the fixed columns and limit.
    pub fn for_question(question: &Question) -> Self {
        Self {
            query: question.as_str().to_string(),
            columns: vec![CHUNK_COLUMN.to_string(), PATH_COLUMN.to_string()],
            limit: SEARCH_LIMIT,
        }
    }

    /// Serializes the request as compact JSON.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| LensError::internal(format!("Failed to encode search payload: {e}")))
    }
}

/// Logical stages of the answer statement, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Retrieve,
    Flatten,
    Extract,
    Rank,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Retrieve, Stage::Flatten, Stage::Extract, Stage::Rank];

    pub fn description(&self) -> &'static str {
        match self {
            Self::Retrieve => "SEARCH_PREVIEW finds the most relevant indexed chunks",
            Self::Flatten => "one row per retrieved chunk",
            Self::Extract => "EXTRACT_ANSWER per chunk, one row per answer",
            Self::Rank => "order by confidence score, highest first",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieve => "Retrieve",
            Self::Flatten => "Flatten",
            Self::Extract => "Extract",
            Self::Rank => "Rank",
        };
        f.write_str(name)
    }
}

/// Everything needed to run, and explain, one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub question: Question,
    pub search: SearchRequest,
    /// Compact JSON bound as the search payload.
    pub payload: String,
    pub statement: Statement,
}

impl QueryPlan {
    pub fn stages(&self) -> &'static [Stage] {
        &Stage::ALL
    }

    /// Returns the search payload pretty-printed for display.
    pub fn payload_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.search).unwrap_or_else(|_| self.payload.clone())
    }
}

/// Builds answer and retrieve-only statements for one search service.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    service: String,
}

impl QueryBuilder {
    /// Creates a builder for the named search service.
    pub fn new(service: &str) -> Result<Self> {
        validate_identifier(service)?;
        Ok(Self {
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Builds the full retrieve, flatten, extract, rank statement.
    pub fn build(&self, question: &Question) -> Result<QueryPlan> {
        let search = SearchRequest::for_question(question);
        let payload = search.to_payload()?;
        let service = name_literal(&self.service)?;

        let sql = format!(
            "WITH preview AS (
  SELECT PARSE_JSON(
    SNOWFLAKE.CORTEX.SEARCH_PREVIEW({service}, ?)
  )['results'] AS results
),
flattened AS (
  SELECT
    value:{CHUNK_COLUMN}::STRING AS chunk,
    value:{PATH_COLUMN}::STRING AS file_name
  FROM preview,
  LATERAL FLATTEN(input => results)
),
extracted AS (
  SELECT
    file_name,
    chunk,
    SNOWFLAKE.CORTEX.EXTRACT_ANSWER(chunk, ?) AS extracted_answer
  FROM flattened
),
answers AS (
  SELECT
    file_name,
    chunk,
    value:answer::STRING AS answer,
    value:score::FLOAT AS confidence_score
  FROM extracted,
  LATERAL FLATTEN(input => extracted_answer)
)
SELECT
  file_name AS {FILE_NAME_ALIAS},
  chunk AS {CHUNK_ALIAS},
  answer AS {ANSWER_ALIAS},
  confidence_score AS {SCORE_ALIAS}
FROM answers
ORDER BY confidence_score DESC"
        );

        let statement = Statement::new(sql)
            .bind(payload.clone())
            .bind(question.as_str());
        statement.validate()?;

        Ok(QueryPlan {
            question: question.clone(),
            search,
            payload,
            statement,
        })
    }

    /// Builds a statement running only the retrieve stage.
    ///
    /// The single `RESULTS` column holds the raw search response; flattening
    /// happens client side.
    pub fn build_retrieve_only(&self, question: &Question) -> Result<Statement> {
        let payload = SearchRequest::for_question(question).to_payload()?;
        let service = name_literal(&self.service)?;
        let statement = Statement::new(format!(
            "SELECT PARSE_JSON(SNOWFLAKE.CORTEX.SEARCH_PREVIEW({service}, ?)) AS {RESULTS_ALIAS}"
        ))
        .bind(payload);
        statement.validate()?;
        Ok(statement)
    }
}
