//! Mock warehouse clients for testing and offline demos.
//!
//! `MockWarehouse` answers `SELECT * FROM <table>` from registered tables,
//! returns canned results for registered SQL fragments, and emulates the
//! search and answer-extraction functions over an in-memory corpus.
//! Every executed statement is recorded for inspection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{ColumnInfo, QueryResult, Statement, Value, WarehouseClient};
use crate::error::{LensError, Result};
use crate::rag::{
    flatten_extraction, flatten_matches, CandidateChunk, ExtractedAnswer, ResultSet,
    SearchRequest, ANSWER_ALIAS, CHUNK_ALIAS, FILE_NAME_ALIAS, PATH_COLUMN, RESULTS_ALIAS,
    SCORE_ALIAS,
};

/// A mock warehouse client with scripted data.
#[derive(Default)]
pub struct MockWarehouse {
    tables: HashMap<String, QueryResult>,
    responses: Vec<(String, QueryResult)>,
    corpus: Vec<CandidateChunk>,
    extractions: HashMap<String, serde_json::Value>,
    executed: Mutex<Vec<Statement>>,
    closed: AtomicBool,
}

impl MockWarehouse {
    /// Creates a mock with no data; every query returns an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table for `SELECT * FROM <name>`.
    pub fn with_table(mut self, name: &str, result: QueryResult) -> Self {
        self.tables.insert(name.to_uppercase(), result);
        self
    }

    /// Returns `result` for any statement whose SQL contains `fragment`.
    pub fn with_response(mut self, fragment: &str, result: QueryResult) -> Self {
        self.responses.push((fragment.to_string(), result));
        self
    }

    /// Adds a chunk to the search corpus, returned in insertion order.
    pub fn with_chunk(mut self, source_path: &str, chunk_text: &str) -> Self {
        self.corpus.push(CandidateChunk {
            chunk_text: chunk_text.to_string(),
            source_path: source_path.to_string(),
        });
        self
    }

    /// Sets the answers extracted from a chunk, as `(answer, score)` pairs.
    pub fn with_answers(mut self, chunk_text: &str, answers: &[(&str, f64)]) -> Self {
        let items = answers
            .iter()
            .map(|(answer, score)| json!({"answer": answer, "score": score}))
            .collect::<Vec<_>>();
        self.extractions
            .insert(chunk_text.to_string(), serde_json::Value::Array(items));
        self
    }

    /// A small call-center corpus and every default trial table, for `--mock-db` runs.
    pub fn demo() -> Self {
        let lipitor = "Agent: I checked your plan. Lipitor is covered under your gold plan with a $10 copay.";
        let claim = "Agent: Your claim from March was approved and the payment was issued last week.";
        let text = |v: &str| Value::from(v);

        Self::new()
            .with_chunk("audio/call_0001.txt", lipitor)
            .with_chunk("audio/call_0007.txt", claim)
            .with_answers(lipitor, &[("Lipitor is covered under your gold plan", 0.912), ("$10 copay", 0.341)])
            .with_answers(claim, &[("approved", 0.655)])
            .with_table(
                "CLINICAL_TRIAL_CORE_NORMALIZED",
                demo_table(
                    &["NCT_ID", "BRIEF_TITLE", "OVERALL_STATUS", "START_DATE", "LEAD_SPONSOR"],
                    vec![vec![
                        text("NCT04280705"),
                        text("Adaptive COVID-19 Treatment Trial"),
                        text("COMPLETED"),
                        text("2020-02-21"),
                        text("National Institute of Allergy and Infectious Diseases"),
                    ]],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_LOCATIONS_NORMALIZED",
                demo_table(
                    &["FACILITY", "CITY", "COUNTRY", "LATITUDE", "LONGITUDE"],
                    vec![
                        vec![
                            text("University of Nebraska Medical Center"),
                            text("Omaha"),
                            text("United States"),
                            Value::Float(41.2565),
                            Value::Float(-95.9345),
                        ],
                        vec![text("National University Hospital"), text("Singapore"), text("Singapore"), Value::Null, Value::Null],
                    ],
                ),
            )
            .with_table(
                "CLINICAL_TRIAL_DESIGN_NORMALIZED",
                demo_table(
                    &["STUDY_TYPE", "PHASES", "ENROLLMENT_INFO", "PRIMARY_PURPOSE", "INTERVENTION_NAME", "SEX"],
                    vec![vec![
                        text("INTERVENTIONAL"),
                        text("PHASE3"),
                        text("1062 (ACTUAL)"),
                        text("TREATMENT"),
                        text("Remdesivir"),
                        text("ALL"),
                    ]],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_DESIGN_OUTCOMES_NORMALIZED",
                demo_table(
                    &["OUTCOME_TYPE", "MEASURE", "TIME_FRAME"],
                    vec![
                        vec![text("PRIMARY"), text("Time to Recovery"), text("Day 1 through Day 29")],
                        vec![text("SECONDARY"), text("28-Day Mortality"), text("Day 1 through Day 29")],
                    ],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_BASELINE_MEASURES_NORMALIZED",
                demo_table(
                    &["PARAM_TITLE", "CATEGORY_TITLE", "VALUE"],
                    vec![
                        vec![text("Race (NIH/OMB)"), text("Asian"), Value::Int(135)],
                        vec![text("Race (NIH/OMB)"), text("White"), Value::Int(566)],
                        vec![text("Sex: Female, Male"), text("Female"), Value::Int(384)],
                    ],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_OUTCOME_MEASURES_NORMALIZED",
                demo_table(
                    &[
                        "OUTCOME_TYPE",
                        "OUTCOME_TITLE",
                        "OUTCOME_DESCRIPTION",
                        "TIME_FRAME",
                        "CLASS_TITLE",
                        "MEASUREMENT_VALUE",
                    ],
                    vec![
                        vec![
                            text("PRIMARY"),
                            text("Time to Recovery"),
                            text("Days until recovery"),
                            text("Day 1 through Day 29"),
                            text("Remdesivir"),
                            Value::Int(10),
                        ],
                        vec![
                            text("SECONDARY"),
                            text("28-Day Mortality"),
                            text("Deaths by day 29"),
                            text("Day 1 through Day 29"),
                            text("Placebo"),
                            Value::Int(77),
                        ],
                    ],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_ADVERSE_EVENTS_NORMALIZED",
                demo_table(
                    &["ADVERSE_EVENT_TYPE", "ORGAN_SYSTEM", "TERM", "AFFECTED_PARTICIPANTS"],
                    vec![
                        vec![text("SERIOUS"), text("Respiratory disorders"), text("Respiratory failure"), Value::Int(29)],
                        vec![text("OTHER"), text("Investigations"), text("Anaemia"), Value::Int(21)],
                    ],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_LIMITATIONS_NORMALIZED",
                demo_table(
                    &["NCT_ID", "DESCRIPTION"],
                    vec![vec![text("NCT04280705"), text("Enrollment closed before the planned sample size.")]],
                ),
            )
            .with_table(
                "CLINICAL_TRIALS_DOCUMENTS_NORMALIZED",
                demo_table(
                    &["DOCUMENT_TYPE", "DOCUMENT_URL"],
                    vec![vec![text("Study Protocol"), text("https://clinicaltrials.gov/ProvidedDocs/05/NCT04280705/Prot_000.pdf")]],
                ),
            )
    }

    /// Returns every statement executed so far.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, statement: &Statement) {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(statement.clone());
    }

    /// Emulates `SEARCH_PREVIEW` for the payload bound to the statement.
    fn search(&self, statement: &Statement) -> Result<serde_json::Value> {
        let payload = statement
            .bindings
            .first()
            .and_then(|b| b.as_text())
            .ok_or_else(|| LensError::execution("SEARCH_PREVIEW requires a JSON payload"))?;
        let request: SearchRequest = serde_json::from_str(payload)
            .map_err(|e| LensError::execution(format!("Invalid search payload: {e}")))?;

        let results = self
            .corpus
            .iter()
            .take(request.limit as usize)
            .map(|chunk| {
                let mut item = serde_json::Map::new();
                for column in &request.columns {
                    let value = if column == PATH_COLUMN {
                        &chunk.source_path
                    } else {
                        &chunk.chunk_text
                    };
                    item.insert(column.clone(), json!(value));
                }
                serde_json::Value::Object(item)
            })
            .collect::<Vec<_>>();

        Ok(json!({ "results": results }))
    }

    fn answer(&self, statement: &Statement) -> Result<QueryResult> {
        let chunks = flatten_matches(&self.search(statement)?)?;
        let answers: Vec<ExtractedAnswer> = chunks
            .iter()
            .flat_map(|chunk| {
                self.extractions
                    .get(&chunk.chunk_text)
                    .map(|response| flatten_extraction(chunk, response))
                    .unwrap_or_default()
            })
            .collect();

        let rows = ResultSet::ranked(answers)
            .iter()
            .map(|a| {
                vec![
                    Value::from(a.source_path.as_str()),
                    Value::from(a.chunk_text.as_str()),
                    Value::from(a.answer.as_str()),
                    Value::Float(a.confidence_score),
                ]
            })
            .collect();

        Ok(QueryResult::with_data(
            vec![
                ColumnInfo::new(FILE_NAME_ALIAS, "text"),
                ColumnInfo::new(CHUNK_ALIAS, "text"),
                ColumnInfo::new(ANSWER_ALIAS, "text"),
                ColumnInfo::new(SCORE_ALIAS, "real"),
            ],
            rows,
        ))
    }

    fn select_star(&self, sql: &str) -> Option<Result<QueryResult>> {
        let table = sql
            .trim()
            .strip_prefix("SELECT * FROM ")?
            .trim_end_matches(';')
            .trim()
            .to_uppercase();

        Some(self.tables.get(&table).cloned().ok_or_else(|| {
            LensError::execution(format!(
                "SQL compilation error: Object '{table}' does not exist or not authorized."
            ))
        }))
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouse {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LensError::execution("Client has been closed"));
        }
        statement.validate()?;
        self.record(statement);

        let sql = statement.sql.as_str();
        let result = if let Some((_, canned)) = self.responses.iter().find(|(f, _)| sql.contains(f.as_str())) {
            Ok(canned.clone())
        } else if sql.contains("SEARCH_PREVIEW") && sql.contains("EXTRACT_ANSWER") {
            self.answer(statement)
        } else if sql.contains("SEARCH_PREVIEW") {
            let response = self.search(statement)?;
            Ok(QueryResult::with_data(
                vec![ColumnInfo::new(RESULTS_ALIAS, "variant")],
                vec![vec![Value::Json(response)]],
            ))
        } else if let Some(result) = self.select_star(sql) {
            result
        } else {
            Ok(QueryResult::new())
        };

        result.map(|r| r.with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A warehouse client whose every statement fails with the same error.
pub struct FailingWarehouse {
    message: String,
    calls: AtomicUsize,
}

impl FailingWarehouse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of statements submitted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarehouseClient for FailingWarehouse {
    async fn execute(&self, _statement: &Statement) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LensError::execution(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Text-typed columns for the demo tables.
fn demo_table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::with_data(columns.iter().map(|c| ColumnInfo::new(*c, "text")).collect(), rows)
}
