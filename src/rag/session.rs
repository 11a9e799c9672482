//! Per-question submission flow.
//!
//! Each submission walks `Idle -> QueryBuilt -> Executing` and ends in
//! `Rendered` or `Failed`. Nothing is retried and nothing is cached between
//! submissions.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LensError, Result};
use crate::rag::answer::candidates_from_query_result;
use crate::rag::{CandidateChunk, QueryBuilder, QueryPlan, Question, ResultSet};
use crate::warehouse::WarehouseClient;

/// Where a submission currently is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    QueryBuilt,
    Executing,
    /// Answers are ready for display (possibly none).
    Rendered(ResultSet),
    /// The warehouse rejected or failed the statement.
    Failed(String),
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::QueryBuilt => "query_built",
            Self::Executing => "executing",
            Self::Rendered(_) => "rendered",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rendered(_) | Self::Failed(_))
    }

    fn can_become(&self, next: &SubmissionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::QueryBuilt)
                | (Self::Idle, Self::Failed(_))
                | (Self::QueryBuilt, Self::Executing)
                | (Self::Executing, Self::Rendered(_))
                | (Self::Executing, Self::Failed(_))
        )
    }
}

/// One question and everything that happened to it.
#[derive(Debug, Clone)]
pub struct Submission {
    question: Question,
    plan: Option<QueryPlan>,
    state: SubmissionState,
    error_category: Option<&'static str>,
    elapsed: Duration,
}

impl Submission {
    /// Starts a submission in the `Idle` state.
    pub fn new(question: Question) -> Self {
        Self {
            question,
            plan: None,
            state: SubmissionState::Idle,
            error_category: None,
            elapsed: Duration::ZERO,
        }
    }

    fn advance(&mut self, next: SubmissionState) -> Result<()> {
        if !self.state.can_become(&next) {
            return Err(LensError::internal(format!(
                "Invalid submission transition {} -> {}",
                self.state.name(),
                next.name()
            )));
        }
        debug!("Submission {} -> {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, error: &LensError) -> Result<()> {
        self.error_category = Some(error.category());
        self.advance(SubmissionState::Failed(error.message().to_string()))
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn plan(&self) -> Option<&QueryPlan> {
        self.plan.as_ref()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Returns the answers once rendered; `None` in every other state.
    pub fn result_set(&self) -> Option<&ResultSet> {
        match &self.state {
            SubmissionState::Rendered(set) => Some(set),
            _ => None,
        }
    }

    /// Returns the category and message of a failed submission.
    pub fn failure(&self) -> Option<(&'static str, &str)> {
        match &self.state {
            SubmissionState::Failed(message) => Some((
                self.error_category.unwrap_or("Execution Error"),
                message.as_str(),
            )),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Runs questions against one warehouse handle.
pub struct AskSession<'a> {
    warehouse: &'a dyn WarehouseClient,
    builder: QueryBuilder,
}

impl<'a> AskSession<'a> {
    pub fn new(warehouse: &'a dyn WarehouseClient, builder: QueryBuilder) -> Self {
        Self { warehouse, builder }
    }

    /// Submits raw user input.
    ///
    /// Blank input returns `None` without building or executing anything.
    pub async fn submit(&self, input: &str) -> Result<Option<Submission>> {
        match Question::new(input) {
            Some(question) => self.ask(question).await.map(Some),
            None => {
                debug!("Ignoring empty question");
                Ok(None)
            }
        }
    }

    /// Runs one question to a terminal state.
    ///
    /// Warehouse failures end in `Failed`; the outer `Err` is reserved for
    /// broken state transitions.
    pub async fn ask(&self, question: Question) -> Result<Submission> {
        let start = Instant::now();
        let mut submission = Submission::new(question);

        let plan = match self.builder.build(&submission.question) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Could not build query: {}", e);
                submission.fail(&e)?;
                submission.elapsed = start.elapsed();
                return Ok(submission);
            }
        };
        submission.plan = Some(plan);
        submission.advance(SubmissionState::QueryBuilt)?;

        submission.advance(SubmissionState::Executing)?;
        let outcome = match &submission.plan {
            Some(plan) => self
                .warehouse
                .execute(&plan.statement)
                .await
                .and_then(|result| ResultSet::from_query_result(&result)),
            None => Err(LensError::internal("Executing without a query plan")),
        };

        match outcome {
            Ok(set) => {
                info!("Question answered with {} result(s)", set.len());
                submission.advance(SubmissionState::Rendered(set))?;
            }
            Err(e) => {
                warn!("Question failed: {}", e);
                submission.fail(&e)?;
            }
        }

        submission.elapsed = start.elapsed();
        Ok(submission)
    }

    /// Runs only the retrieve stage and returns the candidate chunks.
    pub async fn retrieve(&self, question: &Question) -> Result<Vec<CandidateChunk>> {
        let statement = self.builder.build_retrieve_only(question)?;
        let result = self.warehouse.execute(&statement).await?;
        candidates_from_query_result(&result)
    }
}
