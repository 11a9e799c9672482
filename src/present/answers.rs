//! Display of question-answering results.
//!
//! A finished [`Submission`] becomes a [`Presentation`]: ranked answer cards,
//! the no-answer notice, or a failure. Presentations render as text for the
//! terminal or serialize into an [`AskReport`] for `--output json`.

use serde::Serialize;

use crate::error::{LensError, Result};
use crate::rag::{CandidateChunk, QueryPlan, Submission, SubmissionState};

/// Shown when a question matched nothing.
pub const NO_ANSWER_MESSAGE: &str = "No relevant answers found.";

/// Width used to wrap expanded chunk text.
const WRAP_WIDTH: usize = 76;

/// One ranked answer as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerCard {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub source_path: String,
    pub answer: String,
    /// Confidence rounded to 3 decimal places.
    pub confidence: f64,
    pub chunk_text: String,
}

impl AnswerCard {
    /// Confidence formatted with exactly 3 decimals.
    pub fn confidence_label(&self) -> String {
        format!("{:.3}", self.confidence)
    }
}

/// What the user sees for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Presentation {
    Answers { answers: Vec<AnswerCard> },
    NoAnswer { message: String },
    Failed { category: String, message: String },
    /// The submission has not reached a terminal state.
    Pending { state: String },
}

impl Presentation {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Builds the presentation for a submission.
pub fn present(submission: &Submission) -> Presentation {
    match submission.state() {
        SubmissionState::Rendered(set) if set.is_empty() => Presentation::NoAnswer {
            message: NO_ANSWER_MESSAGE.to_string(),
        },
        SubmissionState::Rendered(set) => Presentation::Answers {
            answers: set
                .iter()
                .enumerate()
                .map(|(i, a)| AnswerCard {
                    rank: i + 1,
                    source_path: a.source_path.clone(),
                    answer: a.answer.clone(),
                    confidence: a.rounded_score(),
                    chunk_text: a.chunk_text.clone(),
                })
                .collect(),
        },
        SubmissionState::Failed(_) => {
            let (category, message) = submission
                .failure()
                .unwrap_or(("Execution Error", "Unknown failure"));
            Presentation::Failed {
                category: category.to_string(),
                message: message.to_string(),
            }
        }
        other => Presentation::Pending {
            state: other.name().to_string(),
        },
    }
}

/// Renders a presentation as terminal text.
///
/// Chunk text is collapsed unless `expand_chunks` is set.
pub fn render_presentation(presentation: &Presentation, expand_chunks: bool) -> String {
    match presentation {
        Presentation::Answers { answers } => answers
            .iter()
            .map(|card| render_card(card, expand_chunks))
            .collect::<Vec<_>>()
            .join("\n\n"),
        Presentation::NoAnswer { message } => message.clone(),
        Presentation::Failed { category, message } => format!("{category}: {message}"),
        Presentation::Pending { state } => format!("Submission is still {state}"),
    }
}

fn render_card(card: &AnswerCard, expand_chunk: bool) -> String {
    let mut lines = vec![
        format!("Match {}", card.rank),
        format!("  File:       {}", card.source_path),
        format!("  Answer:     {}", card.answer),
        format!("  Confidence: {}", card.confidence_label()),
    ];
    if expand_chunk {
        lines.push("  Chunk:".to_string());
        lines.extend(wrap(&card.chunk_text, WRAP_WIDTH).into_iter().map(|l| format!("    {l}")));
    } else {
        lines.push(format!(
            "  Chunk:      ({} chars, use --expand to show)",
            card.chunk_text.chars().count()
        ));
    }
    lines.join("\n")
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// The statement behind an answer, for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub question: String,
    /// Search payload, pretty-printed.
    pub payload: String,
    pub sql: String,
    /// Bound values by position.
    pub bindings: Vec<String>,
    /// `(stage, description)` in execution order.
    pub stages: Vec<(String, String)>,
}

impl Diagnostics {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        Self {
            question: plan.question.as_str().to_string(),
            payload: plan.payload_pretty(),
            sql: plan.statement.sql.clone(),
            bindings: plan
                .statement
                .bindings
                .iter()
                .map(|b| b.wire_value())
                .collect(),
            stages: plan
                .stages()
                .iter()
                .map(|s| (s.to_string(), s.description().to_string()))
                .collect(),
        }
    }
}

/// Renders diagnostics as terminal text.
pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    out.push_str(&format!("Question: {}\n\n", diagnostics.question));

    out.push_str("Search payload:\n");
    for line in diagnostics.payload.lines() {
        out.push_str(&format!("  {line}\n"));
    }

    out.push_str("\nStages:\n");
    for (i, (stage, description)) in diagnostics.stages.iter().enumerate() {
        out.push_str(&format!("  {}. {stage}: {description}\n", i + 1));
    }

    out.push_str("\nBindings:\n");
    for (i, value) in diagnostics.bindings.iter().enumerate() {
        out.push_str(&format!("  ?{} = {value}\n", i + 1));
    }

    out.push_str("\nSQL:\n");
    out.push_str(&diagnostics.sql);
    out
}

/// Renders retrieved chunks for `--retrieve-only`.
pub fn render_candidates(chunks: &[CandidateChunk]) -> String {
    if chunks.is_empty() {
        return "No chunks retrieved.".to_string();
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut lines = vec![format!("Chunk {} ({})", i + 1, chunk.source_path)];
            lines.extend(wrap(&chunk.chunk_text, WRAP_WIDTH).into_iter().map(|l| format!("  {l}")));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Machine-readable outcome of one question.
#[derive(Debug, Clone, Serialize)]
pub struct AskReport {
    pub question: String,
    #[serde(flatten)]
    pub presentation: Presentation,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl AskReport {
    pub fn new(submission: &Submission, include_diagnostics: bool) -> Self {
        Self {
            question: submission.question().as_str().to_string(),
            presentation: present(submission),
            elapsed_ms: submission.elapsed().as_millis(),
            diagnostics: submission
                .plan()
                .filter(|_| include_diagnostics)
                .map(Diagnostics::from_plan),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LensError::internal(format!("Failed to encode report: {e}")))
    }
}
