//! Live Snowflake SQL API tests.
//!
//! Require SNOWFLAKE_TEST_URL (a snowflake:// connection string) and a token,
//! either in the URL or in SNOWFLAKE_TOKEN. Skipped otherwise.

use cortex_lens::config::ConnectionConfig;
use cortex_lens::warehouse::{SnowflakeClient, Statement, Value, WarehouseClient};

/// Helper to get the test connection string from environment.
fn get_test_url() -> Option<String> {
    std::env::var("SNOWFLAKE_TEST_URL").ok()
}

/// Helper to create a connected test client.
async fn get_test_client() -> Option<SnowflakeClient> {
    let url = get_test_url()?;
    let mut config = ConnectionConfig::from_connection_string(&url).ok()?;
    config.apply_env_defaults();
    SnowflakeClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: SNOWFLAKE_TEST_URL not set");
        return;
    };

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_bound_parameters_round_trip() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: SNOWFLAKE_TEST_URL not set");
        return;
    };

    let statement = Statement::new("SELECT ? AS TEXT_VALUE, ? AS NUMBER_VALUE")
        .bind("it's a 'quoted' value")
        .bind(42i64);
    let result = client.execute(&statement).await.unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0], Value::from("it's a 'quoted' value"));
    assert_eq!(result.rows[0][1], Value::Int(42));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_execution_error() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: SNOWFLAKE_TEST_URL not set");
        return;
    };

    let err = client
        .execute(&Statement::new("SELEC 1"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Execution Error");
    assert!(err.to_string().contains("Snowflake API error"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_to_unreachable_endpoint() {
    let config = ConnectionConfig {
        account: Some("unreachable".to_string()),
        token: Some("not-a-token".to_string()),
        base_url: Some("http://127.0.0.1:9".to_string()),
        timeout_secs: 5,
        ..Default::default()
    };

    let err = SnowflakeClient::connect(&config).await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}

#[test]
fn test_missing_token_is_config_error() {
    let config = ConnectionConfig {
        account: Some("xy12345".to_string()),
        ..Default::default()
    };

    let err = SnowflakeClient::new(&config).unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
}
