//! Retrieved chunks, extracted answers and ranked result sets.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LensError, Result};
use crate::rag::builder::{
    ANSWER_ALIAS, CHUNK_ALIAS, CHUNK_COLUMN, FILE_NAME_ALIAS, PATH_COLUMN, SCORE_ALIAS,
};
use crate::warehouse::{QueryResult, Value};

static NULL: Value = Value::Null;

/// Magnitude above which scores are not rounded.
const ROUNDING_LIMIT: f64 = 1e15;

/// A passage returned by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateChunk {
    pub chunk_text: String,
    pub source_path: String,
}

/// One answer extracted from a candidate chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAnswer {
    pub source_path: String,
    pub chunk_text: String,
    pub answer: String,
    pub confidence_score: f64,
}

impl ExtractedAnswer {
    /// Returns the confidence score rounded to 3 decimal places.
    ///
    /// Scores beyond `1e15` in magnitude have no fractional digits left to
    /// round and are returned as is.
    pub fn rounded_score(&self) -> f64 {
        if self.confidence_score.abs() > ROUNDING_LIMIT {
            return self.confidence_score;
        }
        (self.confidence_score * 1000.0).round() / 1000.0
    }
}

/// Answers for one question, highest confidence first.
///
/// Duplicates are kept: two identical chunks retrieved twice contribute their
/// answers twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    answers: Vec<ExtractedAnswer>,
}

impl ResultSet {
    /// Ranks answers by descending confidence. Ties keep their input order.
    pub fn ranked(mut answers: Vec<ExtractedAnswer>) -> Self {
        answers.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
        Self { answers }
    }

    /// Reads the rows of an answer statement.
    ///
    /// Rows without an answer or a finite score are dropped with a warning.
    /// The rows are re-ranked locally so ordering never depends on the engine.
    pub fn from_query_result(result: &QueryResult) -> Result<Self> {
        if result.is_empty() {
            return Ok(Self::default());
        }

        let index = |name: &str| {
            result.column_index(name).ok_or_else(|| {
                LensError::execution(format!("Answer rows are missing the {name} column"))
            })
        };
        let file_idx = index(FILE_NAME_ALIAS)?;
        let chunk_idx = index(CHUNK_ALIAS)?;
        let answer_idx = index(ANSWER_ALIAS)?;
        let score_idx = index(SCORE_ALIAS)?;

        let mut answers = Vec::with_capacity(result.rows.len());
        for (n, row) in result.rows.iter().enumerate() {
            let cell = |i: usize| row.get(i).unwrap_or(&NULL);

            let (Some(answer), Some(score)) = (cell(answer_idx).as_str(), cell(score_idx).as_f64())
            else {
                warn!("Skipping answer row {} without answer text or score", n + 1);
                continue;
            };
            if !score.is_finite() {
                warn!("Skipping answer row {} with non-finite score", n + 1);
                continue;
            }

            answers.push(ExtractedAnswer {
                source_path: text_or_empty(cell(file_idx)),
                chunk_text: text_or_empty(cell(chunk_idx)),
                answer: answer.to_string(),
                confidence_score: score,
            });
        }

        Ok(Self::ranked(answers))
    }

    pub fn answers(&self) -> &[ExtractedAnswer] {
        &self.answers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractedAnswer> {
        self.answers.iter()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ExtractedAnswer;
    type IntoIter = std::slice::Iter<'a, ExtractedAnswer>;

    fn into_iter(self) -> Self::IntoIter {
        self.answers.iter()
    }
}

fn text_or_empty(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_display_string(),
    }
}

/// Flattens a search response into one candidate per match.
///
/// Accepts either the full response object (`{"results": [...]}`) or the
/// bare match list. Matches missing the chunk or path are skipped.
pub fn flatten_matches(response: &serde_json::Value) -> Result<Vec<CandidateChunk>> {
    let matches = match response {
        serde_json::Value::Object(map) => match map.get("results") {
            Some(serde_json::Value::Array(items)) => items,
            Some(serde_json::Value::Null) | None => return Ok(Vec::new()),
            Some(_) => {
                return Err(LensError::execution(
                    "Search response 'results' is not a list",
                ))
            }
        },
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        _ => return Err(LensError::execution("Unexpected search response shape")),
    };

    let chunks = matches
        .iter()
        .filter_map(|m| {
            let chunk_text = m.get(CHUNK_COLUMN)?.as_str()?;
            let source_path = m.get(PATH_COLUMN)?.as_str()?;
            Some(CandidateChunk {
                chunk_text: chunk_text.to_string(),
                source_path: source_path.to_string(),
            })
        })
        .collect::<Vec<_>>();

    if chunks.len() < matches.len() {
        warn!(
            "Skipped {} search match(es) without {} or {}",
            matches.len() - chunks.len(),
            CHUNK_COLUMN,
            PATH_COLUMN
        );
    }

    Ok(chunks)
}

/// Reads the search response out of a retrieve-only result.
pub fn candidates_from_query_result(result: &QueryResult) -> Result<Vec<CandidateChunk>> {
    let Some(first) = result.rows.first().and_then(|row| row.first()) else {
        return Ok(Vec::new());
    };

    match first {
        Value::Json(json) => flatten_matches(json),
        Value::String(text) => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                LensError::execution(format!("Search response is not valid JSON: {e}"))
            })?;
            flatten_matches(&json)
        }
        Value::Null => Ok(Vec::new()),
        other => Err(LensError::execution(format!(
            "Unexpected search response value: {other}"
        ))),
    }
}

/// Flattens an extraction response (`[{"answer": .., "score": ..}]`) for one
/// chunk. Anything that is not a list yields no answers.
pub fn flatten_extraction(
    chunk: &CandidateChunk,
    response: &serde_json::Value,
) -> Vec<ExtractedAnswer> {
    let Some(items) = response.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            Some(ExtractedAnswer {
                source_path: chunk.source_path.clone(),
                chunk_text: chunk.chunk_text.clone(),
                answer: item.get("answer")?.as_str()?.to_string(),
                confidence_score: item.get("score")?.as_f64()?,
            })
        })
        .collect()
}
