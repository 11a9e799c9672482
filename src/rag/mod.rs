//! Retrieval-augmented question answering.
//!
//! Turns a user question into one parameterized warehouse statement that
//! retrieves candidate chunks from a hosted search service, extracts answers
//! from each chunk and ranks them by confidence:
//!
//! - [`QueryBuilder`] assembles the statement and its search payload
//! - [`ResultSet`] reads and ranks the returned rows
//! - [`AskSession`] drives one submission through its states

mod answer;
mod builder;
mod question;
mod session;

pub use answer::{
    candidates_from_query_result, flatten_extraction, flatten_matches, CandidateChunk,
    ExtractedAnswer, ResultSet,
};
pub use builder::{
    QueryBuilder, QueryPlan, SearchRequest, Stage, ANSWER_ALIAS, CHUNK_ALIAS, CHUNK_COLUMN,
    FILE_NAME_ALIAS, PATH_COLUMN, RESULTS_ALIAS, SCORE_ALIAS, SEARCH_LIMIT,
};
pub use question::Question;
pub use session::{AskSession, Submission, SubmissionState};
