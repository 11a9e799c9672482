//! Dashboard tests against the mock warehouse.

use cortex_lens::config::{ImagingConfig, TrialConfig};
use cortex_lens::dashboards::{ImagingView, TrialDashboard, TrialOptions, TrialSection};
use cortex_lens::present::{render_section, PanelBody};
use cortex_lens::reference::TableCache;
use cortex_lens::warehouse::{ColumnInfo, MockWarehouse, QueryResult, Value};

#[tokio::test]
async fn test_demo_overview_renders() {
    let warehouse = MockWarehouse::demo();
    let cache = TableCache::new();
    let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

    let section = dashboard
        .section(TrialSection::Overview, &TrialOptions::default())
        .await
        .unwrap();
    let text = render_section(&section, 120);

    assert!(text.starts_with("Study Overview\n=============="));
    assert!(text.contains("Study Identifier  NCT04280705"));
    assert!(text.contains("Lead Sponsor"));
    assert!(text.contains("1 row returned"));
}

#[tokio::test]
async fn test_demo_renders_every_section() {
    let warehouse = MockWarehouse::demo();
    let cache = TableCache::new();
    let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

    let sections = dashboard.all_sections(&TrialOptions::default()).await.unwrap();

    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    let expected: Vec<&str> = TrialSection::ALL.iter().map(|s| s.title()).collect();
    assert_eq!(titles, expected);
    assert!(sections.iter().all(|s| !s.panels.is_empty()));

    // One read per configured table, design outcomes included
    assert_eq!(warehouse.executed().len(), 9);
    assert_eq!(cache.len().await, 9);

    let design = &sections[2];
    assert!(design.panel("Design Outcomes Table").is_some());
    let limitations = render_section(&sections[7], 120);
    assert!(limitations.contains("Enrollment closed before the planned sample size."));
}

#[tokio::test]
async fn test_sections_share_one_cache() {
    let warehouse = MockWarehouse::demo();
    let cache = TableCache::new();
    let dashboard = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());

    for _ in 0..2 {
        dashboard
            .section(TrialSection::Overview, &TrialOptions::default())
            .await
            .unwrap();
    }
    let other = TrialDashboard::new(&warehouse, &cache, TrialConfig::default());
    other
        .section(TrialSection::Overview, &TrialOptions::default())
        .await
        .unwrap();

    assert_eq!(warehouse.executed().len(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_configured_table_names_are_used() {
    let documents = QueryResult::with_data(
        vec![ColumnInfo::new("DOCUMENT_URL", "text")],
        vec![vec![Value::from("https://example.org/protocol.pdf")]],
    );
    let warehouse = MockWarehouse::new().with_table("TRIAL_DOCS", documents);
    let cache = TableCache::new();
    let tables = TrialConfig {
        documents: "trial_docs".to_string(),
        ..Default::default()
    };
    let dashboard = TrialDashboard::new(&warehouse, &cache, tables);

    let section = dashboard
        .section(TrialSection::Documents, &TrialOptions::default())
        .await
        .unwrap();

    assert_eq!(warehouse.executed()[0].sql, "SELECT * FROM TRIAL_DOCS");
    let PanelBody::Table(table) = &section.panels[0].body else {
        panic!("expected table");
    };
    assert_eq!(table.row_count, 1);
}

#[tokio::test]
async fn test_invalid_table_name_is_a_config_error() {
    let warehouse = MockWarehouse::demo();
    let cache = TableCache::new();
    let tables = TrialConfig {
        core: "core; DELETE FROM core".to_string(),
        ..Default::default()
    };
    let dashboard = TrialDashboard::new(&warehouse, &cache, tables);

    let err = dashboard
        .section(TrialSection::Overview, &TrialOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
    assert!(warehouse.executed().is_empty());
}

#[tokio::test]
async fn test_imaging_diagnose_binds_path() {
    let warehouse = MockWarehouse::new();
    let view = ImagingView::new(&warehouse, ImagingConfig::default());

    let diagnosis = view.diagnose("MEDICAL_IMAGES/it's.jpg").await.unwrap();

    assert!(diagnosis.is_none());
    let executed = warehouse.executed();
    assert!(!executed[0].sql.contains("it's"));
    assert_eq!(
        executed[0].bindings.last().and_then(|b| b.as_text()),
        Some("MEDICAL_IMAGES/it's.jpg")
    );
}
