//! Medical image classification and diagnosis.
//!
//! Lists image files on an internal stage and runs classification,
//! explanation and diagnosis for one file in a single statement. The stage
//! and table names come from config and are validated; the folder prefix,
//! model, categories and file path are bound.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ImagingConfig;
use crate::error::{LensError, Result};
use crate::present::{Panel, PanelBody, Section};
use crate::reference::Frame;
use crate::warehouse::{validate_identifier, QueryResult, Statement, WarehouseClient};

const CLASSIFY_PROMPT: &str = "Please classify this medical image {0}";
const EXPLAIN_PROMPT: &str = "Explain in one sentence why this is a valid classification for image {0}";
const DIAGNOSE_PROMPT: &str = "Provide a concise medical diagnosis based on this image {0}.";

/// Model output for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub relative_path: String,
    pub classification: Option<String>,
    pub explanation: Option<String>,
    pub final_diagnosis: Option<String>,
}

impl Diagnosis {
    fn from_query_result(result: &QueryResult) -> Option<Self> {
        let frame = Frame::new(result);
        Some(Self {
            relative_path: frame.first_text("RELATIVE_PATH")?,
            classification: frame.first_text("CLASSIFICATION"),
            explanation: frame.first_text("EXPLANATION"),
            final_diagnosis: frame.first_text("FINAL_DIAGNOSIS"),
        })
    }

    /// Renders the diagnosis as a dashboard section.
    pub fn to_section(&self) -> Section {
        let shown = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let mut section = Section::new(format!("Image {}", self.relative_path));
        section.push(Panel::new(
            "Classification",
            PanelBody::Fields(vec![
                ("Prediction".to_string(), shown(&self.classification)),
                ("Explanation".to_string(), shown(&self.explanation)),
            ]),
        ));
        section.push(Panel::new("Diagnosis", PanelBody::Text(shown(&self.final_diagnosis))));
        section
    }
}

/// Runs imaging statements against one warehouse handle.
pub struct ImagingView<'a> {
    warehouse: &'a dyn WarehouseClient,
    config: ImagingConfig,
}

impl<'a> ImagingView<'a> {
    pub fn new(warehouse: &'a dyn WarehouseClient, config: ImagingConfig) -> Self {
        Self { warehouse, config }
    }

    /// Statement listing staged files under the configured folder.
    pub fn list_statement(&self) -> Result<Statement> {
        let stage = validate_identifier(&self.config.stage)?;
        let prefix = format!("{}/", self.config.folder.trim_end_matches('/'));
        let statement = Statement::new(format!(
            "SELECT RELATIVE_PATH FROM DIRECTORY(@{stage}) \
             WHERE STARTSWITH(RELATIVE_PATH, ?) ORDER BY RELATIVE_PATH"
        ))
        .bind(prefix);
        statement.validate()?;
        Ok(statement)
    }

    /// Returns the relative paths of the staged images.
    pub async fn list(&self) -> Result<Vec<String>> {
        let result = self.warehouse.execute(&self.list_statement()?).await?;
        let paths: Vec<String> = Frame::new(&result)
            .column("RELATIVE_PATH")
            .ok_or_else(|| LensError::execution("Stage listing has no RELATIVE_PATH column"))?
            .filter(|v| !v.is_null())
            .map(|v| v.to_display_string())
            .collect();
        info!("Found {} staged image(s)", paths.len());
        Ok(paths)
    }

    /// Statement classifying, explaining and diagnosing one file.
    pub fn diagnose_statement(&self, relative_path: &str) -> Result<Statement> {
        let relative_path = relative_path.trim();
        if relative_path.is_empty() {
            return Err(LensError::config("Image path must not be empty"));
        }
        if self.config.categories.is_empty() {
            return Err(LensError::config("imaging.categories must list at least one label"));
        }
        let table = validate_identifier(&self.config.table)?;
        let placeholders = vec!["?"; self.config.categories.len()].join(", ");

        let sql = format!(
            "SELECT
  RELATIVE_PATH,
  AI_CLASSIFY(
    PROMPT('{CLASSIFY_PROMPT}', IMAGE_FILE),
    ARRAY_CONSTRUCT({placeholders})
  ):labels[0]::STRING AS CLASSIFICATION,
  AI_COMPLETE(?, PROMPT('{EXPLAIN_PROMPT}', IMAGE_FILE)) AS EXPLANATION,
  AI_COMPLETE(?, PROMPT('{DIAGNOSE_PROMPT}', IMAGE_FILE)) AS FINAL_DIAGNOSIS
FROM {table}
WHERE RELATIVE_PATH = ?"
        );

        let statement = self
            .config
            .categories
            .iter()
            .fold(Statement::new(sql), |stmt, category| stmt.bind(category.as_str()))
            .bind(self.config.model.as_str())
            .bind(self.config.model.as_str())
            .bind(relative_path);
        statement.validate()?;
        Ok(statement)
    }

    /// Diagnoses one staged file. Returns `None` if the table has no such file.
    pub async fn diagnose(&self, relative_path: &str) -> Result<Option<Diagnosis>> {
        let statement = self.diagnose_statement(relative_path)?;
        debug!("Diagnosing {}", relative_path);
        let result = self.warehouse.execute(&statement).await?;
        Ok(Diagnosis::from_query_result(&result))
    }
}
