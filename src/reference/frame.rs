//! Lightweight reshaping of tabular results.
//!
//! [`Frame`] borrows a [`QueryResult`] and offers the handful of filters and
//! group-bys the dashboards need. Column names match case-insensitively.
//! Group keys are compared by their display text; NULL keys are dropped.

use std::collections::{BTreeMap, HashSet};

use crate::warehouse::{QueryResult, Row, Value};

static NULL: Value = Value::Null;

/// A read-only view over a result set.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    result: &'a QueryResult,
}

impl<'a> Frame<'a> {
    pub fn new(result: &'a QueryResult) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &'a QueryResult {
        self.result
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        self.result.has_columns(names)
    }

    /// Returns the first row's value in `column`.
    pub fn first(&self, column: &str) -> Option<&'a Value> {
        let idx = self.result.column_index(column)?;
        self.result.rows.first()?.get(idx)
    }

    /// Returns the first row's value in `column` as display text, skipping NULL.
    pub fn first_text(&self, column: &str) -> Option<String> {
        self.first(column)
            .filter(|v| !v.is_null())
            .map(Value::to_display_string)
    }

    /// Iterates the values of one column.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.result.column_index(column)?;
        Some(
            self.result
                .rows
                .iter()
                .map(move |row| row.get(idx).unwrap_or(&NULL)),
        )
    }

    fn keep(&self, predicate: impl Fn(&Row) -> bool) -> QueryResult {
        let rows: Vec<Row> = self
            .result
            .rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect();
        QueryResult::with_data(self.result.columns.clone(), rows)
            .with_execution_time(self.result.execution_time)
    }

    /// Keeps rows whose `column` displays exactly as `value`.
    ///
    /// A missing column yields an empty result with the same columns.
    pub fn filter_eq(&self, column: &str, value: &str) -> QueryResult {
        match self.result.column_index(column) {
            Some(idx) => self.keep(|row| {
                row.get(idx)
                    .is_some_and(|v| !v.is_null() && v.to_display_string() == value)
            }),
            None => self.keep(|_| false),
        }
    }

    /// Keeps rows where any cell contains `needle`, ignoring case.
    ///
    /// A blank needle keeps every row.
    pub fn search(&self, needle: &str) -> QueryResult {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return self.keep(|_| true);
        }
        self.keep(|row| {
            row.iter()
                .any(|v| !v.is_null() && v.to_display_string().to_lowercase().contains(&needle))
        })
    }

    /// Projects `columns`, dropping rows with a NULL in any of them.
    ///
    /// Returns `None` if a column is missing.
    pub fn select_non_null(&self, columns: &[&str]) -> Option<QueryResult> {
        let idx = columns
            .iter()
            .map(|c| self.result.column_index(c))
            .collect::<Option<Vec<_>>>()?;
        let rows: Vec<Row> = self
            .result
            .rows
            .iter()
            .filter_map(|row| {
                idx.iter()
                    .map(|&i| row.get(i).filter(|v| !v.is_null()).cloned())
                    .collect::<Option<Row>>()
            })
            .collect();
        let selected = idx.iter().map(|&i| self.result.columns[i].clone()).collect();
        Some(QueryResult::with_data(selected, rows))
    }

    /// Keeps the first row for each distinct value of `column`.
    ///
    /// Rows with a NULL key are kept, since they cannot duplicate anything.
    pub fn distinct_by(&self, column: &str) -> QueryResult {
        let Some(idx) = self.result.column_index(column) else {
            return self.keep(|_| true);
        };
        let mut seen = HashSet::new();
        let rows: Vec<Row> = self
            .result
            .rows
            .iter()
            .filter(|row| match row.get(idx) {
                Some(v) if !v.is_null() => seen.insert(v.to_display_string()),
                _ => true,
            })
            .cloned()
            .collect();
        QueryResult::with_data(self.result.columns.clone(), rows)
    }

    /// Sorted distinct non-NULL values of `column`.
    pub fn distinct_values(&self, column: &str) -> Vec<String> {
        let Some(values) = self.column(column) else {
            return Vec::new();
        };
        values
            .filter(|v| !v.is_null())
            .map(Value::to_display_string)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Row counts per value of `column`, sorted by key.
    pub fn count_by(&self, column: &str) -> Option<Vec<(String, usize)>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in self.column(column)? {
            if !value.is_null() {
                *counts.entry(value.to_display_string()).or_default() += 1;
            }
        }
        Some(counts.into_iter().collect())
    }

    /// Sum of numeric `value` per combination of `keys`, sorted by keys.
    ///
    /// Non-numeric and NULL values contribute nothing; rows with any NULL key
    /// are dropped. Returns `None` if a column is missing.
    pub fn sum_by(&self, keys: &[&str], value: &str) -> Option<Vec<(Vec<String>, f64)>> {
        let key_idx = keys
            .iter()
            .map(|k| self.result.column_index(k))
            .collect::<Option<Vec<_>>>()?;
        let value_idx = self.result.column_index(value)?;

        let mut sums: BTreeMap<Vec<String>, f64> = BTreeMap::new();
        for row in &self.result.rows {
            let key = key_idx
                .iter()
                .map(|&i| row.get(i).filter(|v| !v.is_null()).map(Value::to_display_string))
                .collect::<Option<Vec<_>>>();
            let Some(key) = key else {
                continue;
            };
            let amount = row.get(value_idx).and_then(Value::as_f64).unwrap_or(0.0);
            *sums.entry(key).or_default() += amount;
        }
        Some(sums.into_iter().collect())
    }
}
