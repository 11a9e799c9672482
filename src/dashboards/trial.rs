//! Clinical trial dashboard.
//!
//! Builds one [`Section`] per dashboard tab from the normalized trial tables.
//! Each table is read once through the shared [`TableCache`]. Panels whose
//! columns are absent from a table are left out rather than failing the
//! whole section.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::config::TrialConfig;
use crate::error::{LensError, Result};
use crate::present::{Panel, PanelBody, Section};
use crate::reference::{Frame, TableCache};
use crate::warehouse::{QueryResult, WarehouseClient};

/// Baseline parameter holding the race breakdown.
pub const RACE_PARAMETER: &str = "Race (NIH/OMB)";

/// Adverse event filter value that keeps every row.
pub const ALL_EVENT_TYPES: &str = "All";

/// Shown for NULL or missing values in field lists.
const MISSING: &str = "-";

/// A tab of the trial dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialSection {
    Overview,
    Locations,
    Design,
    Outcomes,
    Baseline,
    AdverseEvents,
    Documents,
    Limitations,
}

impl TrialSection {
    pub const ALL: [TrialSection; 8] = [
        Self::Overview,
        Self::Locations,
        Self::Design,
        Self::Outcomes,
        Self::Baseline,
        Self::AdverseEvents,
        Self::Documents,
        Self::Limitations,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overview => "Study Overview",
            Self::Locations => "Trial Locations",
            Self::Design => "Study Design",
            Self::Outcomes => "Outcome Measures",
            Self::Baseline => "Baseline Characteristics",
            Self::AdverseEvents => "Adverse Events",
            Self::Documents => "Trial Documents",
            Self::Limitations => "Limitations & Caveats",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Locations => "locations",
            Self::Design => "design",
            Self::Outcomes => "outcomes",
            Self::Baseline => "baseline",
            Self::AdverseEvents => "adverse-events",
            Self::Documents => "documents",
            Self::Limitations => "limitations",
        }
    }
}

impl fmt::Display for TrialSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TrialSection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|section| section.slug() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|s| s.slug()).collect();
                format!("Invalid section: {s}. Expected one of: {}", names.join(", "))
            })
    }
}

/// User filters applied to the searchable tables.
#[derive(Debug, Clone, Default)]
pub struct TrialOptions {
    /// Case-insensitive text filter for the outcome measures table.
    pub search: Option<String>,
    /// Adverse event type to keep; `None` or "All" keeps every type.
    pub event_type: Option<String>,
}

/// Renders trial dashboard sections from cached reference tables.
pub struct TrialDashboard<'a> {
    warehouse: &'a dyn WarehouseClient,
    cache: &'a TableCache,
    tables: TrialConfig,
}

impl<'a> TrialDashboard<'a> {
    pub fn new(warehouse: &'a dyn WarehouseClient, cache: &'a TableCache, tables: TrialConfig) -> Self {
        Self {
            warehouse,
            cache,
            tables,
        }
    }

    async fn load(&self, table: &str) -> Result<std::sync::Arc<QueryResult>> {
        self.cache.load(self.warehouse, table).await
    }

    /// Builds every section in tab order.
    pub async fn all_sections(&self, options: &TrialOptions) -> Result<Vec<Section>> {
        let mut sections = Vec::with_capacity(TrialSection::ALL.len());
        for section in TrialSection::ALL {
            sections.push(self.section(section, options).await?);
        }
        Ok(sections)
    }

    /// Builds one section.
    pub async fn section(&self, which: TrialSection, options: &TrialOptions) -> Result<Section> {
        debug!("Building trial section {}", which);
        let mut section = Section::new(which.title());

        match which {
            TrialSection::Overview => {
                let core = self.load(&self.tables.core).await?;
                overview(&mut section, Frame::new(&core), &self.tables.core);
            }
            TrialSection::Locations => {
                let locations = self.load(&self.tables.locations).await?;
                locations_panels(&mut section, Frame::new(&locations));
            }
            TrialSection::Design => {
                let design = self.load(&self.tables.design).await?;
                let design_outcomes = self.load(&self.tables.design_outcomes).await?;
                design_panels(&mut section, Frame::new(&design), &self.tables.design);
                section.push(Panel::new(
                    "Design Outcomes Table",
                    PanelBody::Table((*design_outcomes).clone()),
                ));
            }
            TrialSection::Outcomes => {
                let outcomes = self.load(&self.tables.outcomes).await?;
                outcome_panels(&mut section, Frame::new(&outcomes), options.search.as_deref());
            }
            TrialSection::Baseline => {
                let baseline = self.load(&self.tables.baseline).await?;
                baseline_panels(&mut section, Frame::new(&baseline));
            }
            TrialSection::AdverseEvents => {
                let adverse = self.load(&self.tables.adverse_events).await?;
                adverse_panels(&mut section, Frame::new(&adverse), options.event_type.as_deref())?;
            }
            TrialSection::Documents => {
                let documents = self.load(&self.tables.documents).await?;
                section.push(Panel::new("Documents Table", PanelBody::Table((*documents).clone())));
            }
            TrialSection::Limitations => {
                let limitations = self.load(&self.tables.limitations).await?;
                if let Some(panel) = text_panel(Frame::new(&limitations), "Limitations of Study", "DESCRIPTION") {
                    section.push(panel);
                }
            }
        }

        info!("Trial section {} has {} panel(s)", which, section.panels.len());
        Ok(section)
    }
}

/// Label/value pairs from the first row; missing columns are left out.
///
/// Returns `None` when none of the columns exist.
fn fields_panel(frame: Frame<'_>, title: &str, fields: &[(&str, &str)]) -> Option<Panel> {
    let values: Vec<(String, String)> = fields
        .iter()
        .filter(|(_, column)| frame.has_columns(&[column]))
        .map(|(label, column)| {
            (
                label.to_string(),
                frame.first_text(column).unwrap_or_else(|| MISSING.to_string()),
            )
        })
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(Panel::new(title, PanelBody::Fields(values)))
    }
}

/// First-row text of one column.
fn text_panel(frame: Frame<'_>, title: &str, column: &str) -> Option<Panel> {
    if !frame.has_columns(&[column]) {
        return None;
    }
    let text = frame.first_text(column).unwrap_or_else(|| MISSING.to_string());
    Some(Panel::new(title, PanelBody::Text(text)))
}

fn counts_panel(frame: Frame<'_>, title: &str, column: &str) -> Option<Panel> {
    let counts = frame.count_by(column)?;
    Some(Panel::new(
        title,
        PanelBody::Totals(counts.into_iter().map(|(k, n)| (k, n as f64)).collect()),
    ))
}

fn sums_panel(frame: Frame<'_>, title: &str, keys: &[&str], value: &str) -> Option<Panel> {
    let sums = frame.sum_by(keys, value)?;
    Some(Panel::new(
        title,
        PanelBody::Totals(sums.into_iter().map(|(k, v)| (k.join(" / "), v)).collect()),
    ))
}

fn push_all(section: &mut Section, panels: impl IntoIterator<Item = Option<Panel>>) {
    for panel in panels.into_iter().flatten() {
        section.push(panel);
    }
}

fn overview(section: &mut Section, core: Frame<'_>, table: &str) {
    if core.is_empty() {
        section.push(Panel::notice("Study Metadata", format!("no rows in {table}")));
        return;
    }
    push_all(
        section,
        [
            fields_panel(
                core,
                "Study Metadata",
                &[
                    ("Study Identifier", "NCT_ID"),
                    ("Brief Title", "BRIEF_TITLE"),
                    ("Official Title", "OFFICIAL_TITLE"),
                ],
            ),
            text_panel(core, "Brief Summary", "BRIEF_SUMMARY"),
            text_panel(core, "Detailed Description", "DETAILED_DESCRIPTION"),
            fields_panel(core, "Conditions", &[("Conditions", "CONDITIONS_SPECIFICS")]),
            fields_panel(
                core,
                "Status",
                &[
                    ("Overall Status", "OVERALL_STATUS"),
                    ("Start Date", "START_DATE"),
                    ("Completion Date", "COMPLETION_DATE"),
                ],
            ),
            fields_panel(
                core,
                "Sponsors & Collaborators",
                &[
                    ("Principal Investigator", "PRINCIPAL_INVESTIGATOR"),
                    ("Lead Sponsor", "LEAD_SPONSOR"),
                    ("Collaborators", "COLLABORATORS"),
                ],
            ),
            Some(Panel::new("Full Study Table", PanelBody::Table(core.result().clone()))),
        ],
    );
}

fn locations_panels(section: &mut Section, locations: Frame<'_>) {
    if let Some(coordinates) = locations.select_non_null(&["LATITUDE", "LONGITUDE"]) {
        section.push(Panel::new("Coordinates", PanelBody::Table(coordinates)));
    }
    section.push(Panel::new(
        "Full Location Table",
        PanelBody::Table(locations.result().clone()),
    ));
}

fn design_panels(section: &mut Section, design: Frame<'_>, table: &str) {
    if design.is_empty() {
        section.push(Panel::notice("Design Metadata", format!("no rows in {table}")));
        return;
    }
    push_all(
        section,
        [
            fields_panel(
                design,
                "Design Metadata",
                &[
                    ("Study Type", "STUDY_TYPE"),
                    ("Phases", "PHASES"),
                    ("Enrollment", "ENROLLMENT_INFO"),
                    ("Primary Purpose", "PRIMARY_PURPOSE"),
                    ("Masking", "MASKING_INFO"),
                    ("Intervention Model", "INTERVENTION_MODEL"),
                ],
            ),
            fields_panel(
                design,
                "Intervention Details",
                &[
                    ("Intervention Type", "INTERVENTION_TYPE"),
                    ("Intervention Name", "INTERVENTION_NAME"),
                    ("Intervention Other Names", "INTERVENTION_OTHER_NAMES"),
                ],
            ),
            text_panel(design, "Intervention Description", "INTERVENTION_DESCRIPTION"),
            fields_panel(
                design,
                "Eligibility Details",
                &[
                    ("Sex", "SEX"),
                    ("Min Age", "MIN_AGE"),
                    ("Max Age", "MAX_AGE"),
                    ("Healthy Volunteers", "HEALTHY_VOLUNTEERS"),
                ],
            ),
            text_panel(design, "Eligibility Criteria", "ELIGIBILITY_CRITERIA"),
            Some(Panel::new("Full Design Table", PanelBody::Table(design.result().clone()))),
        ],
    );
}

/// "TITLE: DESCRIPTION (TIME_FRAME)" for every row.
fn outcome_items(outcomes: &QueryResult) -> Vec<String> {
    let frame = Frame::new(outcomes);
    let column = |name: &str| -> Vec<String> {
        match frame.column(name) {
            Some(values) => values.map(|v| v.to_display_string()).collect(),
            None => vec![MISSING.to_string(); outcomes.rows.len()],
        }
    };
    let titles = column("OUTCOME_TITLE");
    let descriptions = column("OUTCOME_DESCRIPTION");
    let time_frames = column("TIME_FRAME");

    titles
        .iter()
        .zip(&descriptions)
        .zip(&time_frames)
        .map(|((title, description), time_frame)| format!("{title}: {description} ({time_frame})"))
        .collect()
}

fn outcome_panels(section: &mut Section, outcomes: Frame<'_>, search: Option<&str>) {
    if outcomes.has_columns(&["OUTCOME_TYPE"]) {
        let primary = outcomes.filter_eq("OUTCOME_TYPE", "PRIMARY");
        let secondary = Frame::new(&outcomes.filter_eq("OUTCOME_TYPE", "SECONDARY")).distinct_by("OUTCOME_TITLE");

        section.push(Panel::new("Primary Outcome Measures", PanelBody::Items(outcome_items(&primary))));
        section.push(Panel::new(
            "Secondary Outcome Measures",
            PanelBody::Items(outcome_items(&secondary)),
        ));
    }

    push_all(
        section,
        [
            counts_panel(outcomes, "Outcome Measures by Type", "OUTCOME_TYPE"),
            counts_panel(outcomes, "Outcome Measures by Title", "OUTCOME_TITLE"),
            sums_panel(
                outcomes,
                "Participants by Outcome and Class",
                &["OUTCOME_TITLE", "CLASS_TITLE"],
                "MEASUREMENT_VALUE",
            ),
        ],
    );

    let (title, table) = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => (
            format!("Outcome Measures Table (matching '{needle}')"),
            outcomes.search(needle),
        ),
        None => ("Outcome Measures Table".to_string(), outcomes.result().clone()),
    };
    section.push(Panel::new(title, PanelBody::Table(table)));
}

fn baseline_panels(section: &mut Section, baseline: Frame<'_>) {
    push_all(
        section,
        [counts_panel(baseline, "Baseline Measures per Type", "PARAM_TITLE")],
    );

    if baseline.has_columns(&["PARAM_TITLE", "CATEGORY_TITLE", "VALUE"]) {
        let race = baseline.filter_eq("PARAM_TITLE", RACE_PARAMETER);
        push_all(
            section,
            [sums_panel(Frame::new(&race), "Participants by Race", &["CATEGORY_TITLE"], "VALUE")],
        );
    }

    section.push(Panel::new(
        "Baseline Measures Table",
        PanelBody::Table(baseline.result().clone()),
    ));
}

fn adverse_panels(section: &mut Section, adverse: Frame<'_>, event_type: Option<&str>) -> Result<()> {
    if !adverse.is_empty() {
        push_all(
            section,
            [
                text_panel(adverse, "Description", "ADVERSE_EVENT_DESCRIPTION"),
                fields_panel(
                    adverse,
                    "Metadata",
                    &[("Time Frame", "TIME_FRAME"), ("Frequency", "FREQUENCY_THRESHOLD")],
                ),
            ],
        );
    }

    push_all(
        section,
        [
            counts_panel(adverse, "Adverse Events by Type", "ADVERSE_EVENT_TYPE"),
            counts_panel(adverse, "Adverse Events by Organ System", "ORGAN_SYSTEM"),
            sums_panel(
                adverse,
                "Affected Participants by Type and Term",
                &["ADVERSE_EVENT_TYPE", "TERM"],
                "AFFECTED_PARTICIPANTS",
            ),
        ],
    );

    let types = adverse.distinct_values("ADVERSE_EVENT_TYPE");
    let mut options = vec![ALL_EVENT_TYPES.to_string()];
    options.extend(types.iter().cloned());
    section.push(Panel::new("Event Types", PanelBody::Items(options)));

    let table = match event_type.map(str::trim).filter(|t| *t != ALL_EVENT_TYPES) {
        Some(wanted) => {
            if !types.iter().any(|t| t == wanted) {
                return Err(LensError::config(format!(
                    "Unknown adverse event type '{wanted}'. Available: {ALL_EVENT_TYPES}, {}",
                    types.join(", ")
                )));
            }
            adverse.filter_eq("ADVERSE_EVENT_TYPE", wanted)
        }
        None => adverse.result().clone(),
    };
    section.push(Panel::new("Adverse Event Table", PanelBody::Table(table)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{ColumnInfo, MockWarehouse, Value};
    use pretty_assertions::assert_eq;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::with_data(
            columns.iter().map(|c| ColumnInfo::new(*c, "text")).collect(),
            rows,
        )
    }

    fn outcomes() -> QueryResult {
        let row = |kind: &str, title: &str, class: &str, n: i64| {
            vec![
                Value::from(kind),
                Value::from(title),
                Value::from(format!("{title} description").as_str()),
                Value::from("Day 29"),
                Value::from(class),
                Value::Int(n),
            ]
        };
        table(
            &[
                "OUTCOME_TYPE",
                "OUTCOME_TITLE",
                "OUTCOME_DESCRIPTION",
                "TIME_FRAME",
                "CLASS_TITLE",
                "MEASUREMENT_VALUE",
            ],
            vec![
                row("PRIMARY", "Time to Recovery", "Remdesivir", 541),
                row("SECONDARY", "Mortality", "Remdesivir", 59),
                row("SECONDARY", "Mortality", "Placebo", 77),
            ],
        )
    }

    fn adverse() -> QueryResult {
        let row = |kind: &str, organ: &str, term: &str, n: i64| {
            vec![
                Value::from("Serious events were collected."),
                Value::from("Day 1 to Day 29"),
                Value::from("5"),
                Value::from(kind),
                Value::from(organ),
                Value::from(term),
                Value::Int(n),
            ]
        };
        table(
            &[
                "ADVERSE_EVENT_DESCRIPTION",
                "TIME_FRAME",
                "FREQUENCY_THRESHOLD",
                "ADVERSE_EVENT_TYPE",
                "ORGAN_SYSTEM",
                "TERM",
                "AFFECTED_PARTICIPANTS",
            ],
            vec![
                row("SERIOUS", "Cardiac disorders", "Cardiac arrest", 7),
                row("OTHER", "Investigations", "Anaemia", 21),
                row("SERIOUS", "Cardiac disorders", "Cardiac arrest", 3),
            ],
        )
    }

    fn warehouse() -> MockWarehouse {
        let tables = TrialConfig::default();
        MockWarehouse::new()
            .with_table(
                &tables.core,
                table(
                    &["NCT_ID", "BRIEF_TITLE", "OVERALL_STATUS", "START_DATE"],
                    vec![vec![
                        Value::from("NCT04280705"),
                        Value::from("ACTT-1"),
                        Value::from("COMPLETED"),
                        Value::Null,
                    ]],
                ),
            )
            .with_table(&tables.outcomes, outcomes())
            .with_table(&tables.adverse_events, adverse())
            .with_table(
                &tables.baseline,
                table(
                    &["PARAM_TITLE", "CATEGORY_TITLE", "VALUE"],
                    vec![
                        vec![Value::from(RACE_PARAMETER), Value::from("Asian"), Value::from("95")],
                        vec![Value::from(RACE_PARAMETER), Value::from("White"), Value::from("566")],
                        vec![Value::from("Sex: Female, Male"), Value::from("Female"), Value::from("384")],
                    ],
                ),
            )
            .with_table(
                &tables.locations,
                table(
                    &["FACILITY", "LATITUDE", "LONGITUDE"],
                    vec![
                        vec![Value::from("Site A"), Value::Float(47.6), Value::Float(-122.3)],
                        vec![Value::from("Site B"), Value::Null, Value::Null],
                    ],
                ),
            )
            .with_table(&tables.limitations, table(&["NCT_ID"], vec![]))
            .with_table(
                &tables.design,
                table(
                    &["STUDY_TYPE", "PHASES", "SEX"],
                    vec![vec![Value::from("INTERVENTIONAL"), Value::from("PHASE3"), Value::from("ALL")]],
                ),
            )
            .with_table(
                &tables.design_outcomes,
                table(
                    &["OUTCOME_TYPE", "MEASURE", "TIME_FRAME"],
                    vec![
                        vec![Value::from("PRIMARY"), Value::from("Time to Recovery"), Value::from("Day 1 through Day 29")],
                        vec![Value::from("SECONDARY"), Value::from("Mortality"), Value::from("Day 15 and Day 29")],
                    ],
                ),
            )
    }

    fn fields(panel: &Panel) -> &[(String, String)] {
        match &panel.body {
            PanelBody::Fields(fields) => fields,
            other => panic!("expected fields, got {other:?}"),
        }
    }

    fn totals(panel: &Panel) -> &[(String, f64)] {
        match &panel.body {
            PanelBody::Totals(totals) => totals,
            other => panic!("expected totals, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_section() {
        assert_eq!("overview".parse::<TrialSection>().unwrap(), TrialSection::Overview);
        assert_eq!("Adverse_Events".parse::<TrialSection>().unwrap(), TrialSection::AdverseEvents);
        assert!("charts".parse::<TrialSection>().unwrap_err().contains("adverse-events"));
        assert_eq!(TrialSection::AdverseEvents.to_string(), "adverse-events");
    }

    #[tokio::test]
    async fn test_overview_skips_missing_columns() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Overview, &TrialOptions::default())
            .await
            .unwrap();

        assert_eq!(section.title, "Study Overview");
        let metadata = fields(section.panel("Study Metadata").unwrap());
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0], ("Study Identifier".to_string(), "NCT04280705".to_string()));

        let status = fields(section.panel("Status").unwrap());
        assert_eq!(status[1], ("Start Date".to_string(), "-".to_string()));

        assert!(section.panel("Brief Summary").is_none());
        assert!(section.panel("Sponsors & Collaborators").is_none());
        assert!(section.panel("Full Study Table").is_some());
    }

    #[tokio::test]
    async fn test_outcomes_section() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Outcomes, &TrialOptions::default())
            .await
            .unwrap();

        let PanelBody::Items(secondary) = &section.panel("Secondary Outcome Measures").unwrap().body else {
            panic!("expected items");
        };
        assert_eq!(secondary, &vec!["Mortality: Mortality description (Day 29)".to_string()]);

        assert_eq!(
            totals(section.panel("Outcome Measures by Type").unwrap()),
            &[("PRIMARY".to_string(), 1.0), ("SECONDARY".to_string(), 2.0)]
        );
        assert_eq!(
            totals(section.panel("Participants by Outcome and Class").unwrap())[0],
            ("Mortality / Placebo".to_string(), 77.0)
        );
    }

    #[tokio::test]
    async fn test_outcome_search() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());
        let options = TrialOptions {
            search: Some("placebo".to_string()),
            ..Default::default()
        };

        let section = dashboard.section(TrialSection::Outcomes, &options).await.unwrap();
        let panel = section
            .panel("Outcome Measures Table (matching 'placebo')")
            .unwrap();
        let PanelBody::Table(result) = &panel.body else {
            panic!("expected table");
        };
        assert_eq!(result.row_count, 1);
    }

    #[tokio::test]
    async fn test_baseline_race_breakdown() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Baseline, &TrialOptions::default())
            .await
            .unwrap();

        assert_eq!(
            totals(section.panel("Participants by Race").unwrap()),
            &[("Asian".to_string(), 95.0), ("White".to_string(), 566.0)]
        );
    }

    #[tokio::test]
    async fn test_adverse_event_filter() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let options = TrialOptions {
            event_type: Some("SERIOUS".to_string()),
            ..Default::default()
        };
        let section = dashboard.section(TrialSection::AdverseEvents, &options).await.unwrap();

        let PanelBody::Items(types) = &section.panel("Event Types").unwrap().body else {
            panic!("expected items");
        };
        assert_eq!(types, &vec!["All".to_string(), "OTHER".to_string(), "SERIOUS".to_string()]);

        let PanelBody::Table(filtered) = &section.panel("Adverse Event Table").unwrap().body else {
            panic!("expected table");
        };
        assert_eq!(filtered.row_count, 2);
        assert_eq!(
            totals(section.panel("Affected Participants by Type and Term").unwrap())[1],
            ("SERIOUS / Cardiac arrest".to_string(), 10.0)
        );

        let unknown = TrialOptions {
            event_type: Some("MILD".to_string()),
            ..Default::default()
        };
        let err = dashboard
            .section(TrialSection::AdverseEvents, &unknown)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Configuration Error");
    }

    #[tokio::test]
    async fn test_locations_coordinates_drop_nulls() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Locations, &TrialOptions::default())
            .await
            .unwrap();
        let PanelBody::Table(coordinates) = &section.panel("Coordinates").unwrap().body else {
            panic!("expected table");
        };
        assert_eq!(coordinates.row_count, 1);
        assert_eq!(coordinates.columns.len(), 2);
    }

    #[tokio::test]
    async fn test_design_section_includes_design_outcomes() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Design, &TrialOptions::default())
            .await
            .unwrap();

        let executed: Vec<String> = warehouse.executed().into_iter().map(|s| s.sql).collect();
        assert_eq!(
            executed,
            vec![
                "SELECT * FROM CLINICAL_TRIAL_DESIGN_NORMALIZED".to_string(),
                "SELECT * FROM CLINICAL_TRIALS_DESIGN_OUTCOMES_NORMALIZED".to_string(),
            ]
        );

        assert_eq!(
            fields(section.panel("Design Metadata").unwrap())[1],
            ("Phases".to_string(), "PHASE3".to_string())
        );
        let PanelBody::Table(outcomes) = &section.panel("Design Outcomes Table").unwrap().body else {
            panic!("expected table");
        };
        assert_eq!(outcomes.row_count, 2);
        assert_eq!(section.panels.last().unwrap().title, "Design Outcomes Table");
    }

    #[tokio::test]
    async fn test_limitations_without_description_is_empty() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let section = dashboard
            .section(TrialSection::Limitations, &TrialOptions::default())
            .await
            .unwrap();
        assert!(section.panels.is_empty());
    }

    #[tokio::test]
    async fn test_tables_are_read_once() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        for _ in 0..3 {
            dashboard
                .section(TrialSection::Outcomes, &TrialOptions::default())
                .await
                .unwrap();
        }
        assert_eq!(warehouse.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_fails_section() {
        let warehouse = warehouse();
        let cache = TableCache::new();
        let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

        let err = dashboard
            .section(TrialSection::Documents, &TrialOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Execution Error");
        assert!(dashboard.all_sections(&TrialOptions::default()).await.is_err());
    }
}
