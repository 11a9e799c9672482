//! Plain-text result tables.
//!
//! Renders query results with column headers, auto-sized columns and a
//! row-count footer.

use crate::warehouse::{QueryResult, Row, Value};

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// Renders a result as a boxed table no wider than `available_width` where
/// possible.
pub fn render_table(result: &QueryResult, available_width: usize) -> String {
    if result.columns.is_empty() {
        return "(empty result)".to_string();
    }

    let widths = fit_widths(&column_widths(result), available_width);
    let mut lines = Vec::with_capacity(result.rows.len() + 6);

    lines.push(border(&widths, '┌', '┬', '┐'));
    lines.push(row_line(
        result.columns.iter().map(|c| c.name.clone()),
        &widths,
    ));
    lines.push(border(&widths, '├', '┼', '┤'));
    for row in &result.rows {
        lines.push(data_line(row, &widths));
    }
    lines.push(border(&widths, '└', '┴', '┘'));

    lines.push(format!(
        "{} row{} returned ({}ms)",
        result.row_count,
        if result.row_count == 1 { "" } else { "s" },
        result.execution_time.as_millis()
    ));
    if let Some(warning) = result.truncation_warning() {
        lines.push(warning);
    }

    lines.join("\n")
}

/// Calculates the natural width of each column, capped at MAX_COLUMN_WIDTH.
fn column_widths(result: &QueryResult) -> Vec<usize> {
    let mut widths: Vec<usize> = result
        .columns
        .iter()
        .map(|col| col.name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    for row in &result.rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell_text(value).chars().count());
            }
        }
    }

    widths.iter().map(|&w| w.min(MAX_COLUMN_WIDTH)).collect()
}

/// Scales widths down proportionally when the table would overflow.
fn fit_widths(widths: &[usize], available_width: usize) -> Vec<usize> {
    // borders and padding
    let total_width: usize = widths.iter().sum::<usize>() + widths.len() * 3 + 1;
    let scale = if total_width > available_width && available_width > 0 {
        available_width as f64 / total_width as f64
    } else {
        1.0
    };

    widths
        .iter()
        .map(|&w| ((w as f64 * scale) as usize).max(MIN_COLUMN_WIDTH))
        .collect()
}

fn cell_text(value: &Value) -> String {
    // Newlines would break the grid
    value.to_display_string().replace(['\n', '\r'], " ")
}

/// Truncates a string to `max_width` characters, adding an ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let head: String = s.chars().take(max_width - 3).collect();
        format!("{head}...")
    }
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|&w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}", segments.join(&mid.to_string()))
}

fn row_line(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| {
            let text = truncate(&cell, w);
            let pad = w - text.chars().count();
            format!(" {text}{} ", " ".repeat(pad))
        })
        .collect();
    format!("│{}│", padded.join("│"))
}

fn data_line(row: &Row, widths: &[usize]) -> String {
    row_line(row.iter().map(cell_text), widths)
}
