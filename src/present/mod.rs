//! Presentation of results for the terminal and for JSON output.

mod answers;
mod panels;
mod table;

pub use answers::{
    present, render_candidates, render_diagnostics, render_presentation, AnswerCard, AskReport,
    Diagnostics, Presentation, NO_ANSWER_MESSAGE,
};
pub use panels::{render_section, Panel, PanelBody, Section};
pub use table::render_table;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}
