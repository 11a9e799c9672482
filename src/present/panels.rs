//! Dashboard sections and their text rendering.

use serde::Serialize;

use super::table::render_table;
use crate::warehouse::QueryResult;

/// The content of one dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PanelBody {
    /// Label/value pairs.
    Fields(Vec<(String, String)>),
    /// Free text.
    Text(String),
    /// One line per item.
    Items(Vec<String>),
    /// Label/amount pairs, e.g. group counts or sums.
    Totals(Vec<(String, f64)>),
    Table(QueryResult),
    /// Informational message in place of data.
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub body: PanelBody,
}

impl Panel {
    pub fn new(title: impl Into<String>, body: PanelBody) -> Self {
        Self {
            title: title.into(),
            body,
        }
    }

    pub fn notice(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, PanelBody::Notice(message.into()))
    }
}

/// A titled group of panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub panels: Vec<Panel>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            panels: Vec::new(),
        }
    }

    pub fn push(&mut self, panel: Panel) {
        self.panels.push(panel);
    }

    /// Finds a panel by title.
    pub fn panel(&self, title: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.title == title)
    }
}

/// Renders a section for a terminal `width` columns wide.
pub fn render_section(section: &Section, width: usize) -> String {
    let mut out = vec![section.title.clone(), "=".repeat(section.title.chars().count())];

    if section.panels.is_empty() {
        out.push("(no data)".to_string());
    }
    for panel in &section.panels {
        out.push(String::new());
        out.push(panel.title.clone());
        out.push("-".repeat(panel.title.chars().count()));
        out.push(render_body(&panel.body, width));
    }

    out.join("\n")
}

fn render_body(body: &PanelBody, width: usize) -> String {
    match body {
        PanelBody::Fields(fields) => {
            let label_width = fields.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
            fields
                .iter()
                .map(|(label, value)| format!("{label:<label_width$}  {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        PanelBody::Text(text) => text.clone(),
        PanelBody::Items(items) if items.is_empty() => "(none)".to_string(),
        PanelBody::Items(items) => items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
        PanelBody::Totals(totals) if totals.is_empty() => "(none)".to_string(),
        PanelBody::Totals(totals) => {
            let label_width = totals.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
            totals
                .iter()
                .map(|(label, amount)| format!("{label:<label_width$}  {}", format_amount(*amount)))
                .collect::<Vec<_>>()
                .join("\n")
        }
        PanelBody::Table(result) => render_table(result, width),
        PanelBody::Notice(message) => format!("({message})"),
    }
}

/// Whole numbers print without decimals.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    }
}
