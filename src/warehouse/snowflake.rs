//! Snowflake SQL API client.
//!
//! Implements [`WarehouseClient`] over the `/api/v2/statements` REST endpoint
//! using reqwest. Statements are submitted with positional bindings; long
//! running statements are polled by handle, and extra result partitions are
//! fetched until the row cap is reached.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, TokenType};
use crate::error::{LensError, Result};
use crate::warehouse::{ColumnInfo, QueryResult, Row, Statement, Value, WarehouseClient, WireBinding};

/// Maximum rows to return from a statement.
const MAX_ROWS: usize = 1000;

/// Delay between status polls for a running statement.
const POLL_INTERVAL_MS: u64 = 500;

/// Timeout for establishing the TCP/TLS connection.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Extra time allowed on top of the statement timeout before giving up polling.
const POLL_GRACE_SECS: u64 = 5;

const STATEMENTS_PATH: &str = "/api/v2/statements";

/// Snowflake SQL API client.
#[derive(Debug)]
pub struct SnowflakeClient {
    http: Client,
    endpoint: String,
    token: String,
    token_type: TokenType,
    context: SessionContext,
    timeout: Duration,
    closed: AtomicBool,
}

/// Database objects a statement runs against.
#[derive(Debug, Clone, Default)]
struct SessionContext {
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
}

impl SnowflakeClient {
    /// Builds a client from configuration without contacting the warehouse.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let token = config.token.clone().ok_or_else(|| {
            LensError::config("An access token is required (set SNOWFLAKE_TOKEN or connections.<name>.token)")
        })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout + Duration::from_secs(POLL_GRACE_SECS))
            .user_agent(concat!("cortex-lens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LensError::connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            token,
            token_type: config.token_type,
            context: SessionContext {
                warehouse: config.warehouse.clone(),
                database: config.database.clone(),
                schema: config.schema.clone(),
                role: config.role.clone(),
            },
            timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Builds a client and verifies the credentials with a trivial statement.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let client = Self::new(config)?;
        debug!("Verifying connection to {}", client.endpoint);

        client
            .run(&Statement::new("SELECT CURRENT_VERSION()"))
            .await
            .map_err(|e| LensError::connection(e.message().to_string()))?;

        info!("Connected to {}", config.display_string());
        Ok(client)
    }

    fn statements_url(&self) -> String {
        format!("{}{}", self.endpoint, STATEMENTS_PATH)
    }

    fn handle_url(&self, handle: &str) -> String {
        format!("{}{}/{}", self.endpoint, STATEMENTS_PATH, handle)
    }

    fn request_body<'a>(&'a self, statement: &'a Statement) -> SubmitRequest<'a> {
        SubmitRequest {
            statement: &statement.sql,
            timeout: self.timeout.as_secs(),
            warehouse: self.context.warehouse.as_deref(),
            database: self.context.database.as_deref(),
            schema: self.context.schema.as_deref(),
            role: self.context.role.as_deref(),
            bindings: statement.wire_bindings(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", self.token_type.header_value())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn run(&self, statement: &Statement) -> Result<QueryResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LensError::execution("Client has been closed"));
        }
        statement.validate()?;

        let start = Instant::now();
        let response = self
            .authorized(self.http.post(self.statements_url()))
            .json(&self.request_body(statement))
            .send()
            .await
            .map_err(map_request_error)?;

        let mut body = read_body(response).await?;

        let deadline = start + self.timeout + Duration::from_secs(POLL_GRACE_SECS);
        while body.status == StatusCode::ACCEPTED {
            let handle = body
                .payload
                .statement_handle
                .clone()
                .ok_or_else(|| LensError::execution("Statement accepted without a handle"))?;
            if Instant::now() >= deadline {
                return Err(LensError::execution(format!(
                    "Statement {handle} still running after {} seconds",
                    self.timeout.as_secs()
                )));
            }
            debug!("Statement {} still running, polling", handle);
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;

            let response = self
                .authorized(self.http.get(self.handle_url(&handle)))
                .send()
                .await
                .map_err(map_request_error)?;
            body = read_body(response).await?;
        }

        let payload = body.payload;
        let meta = payload
            .result_set_meta_data
            .ok_or_else(|| LensError::execution("Response is missing result metadata"))?;

        let mut data = payload.data;
        if let Some(handle) = payload.statement_handle.as_deref() {
            for partition in 1..meta.partition_info.len() {
                if data.len() > MAX_ROWS {
                    break;
                }
                debug!("Fetching partition {} of statement {}", partition, handle);
                data.extend(self.fetch_partition(handle, partition).await?);
            }
        }

        let mut result = build_result(&meta, data);
        result.execution_time = start.elapsed();

        if result.was_truncated {
            warn!(
                "Statement returned {} rows, truncating to {} rows",
                result.total_rows.unwrap_or(result.row_count),
                MAX_ROWS
            );
        }

        Ok(result)
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<Vec<Option<String>>>> {
        let response = self
            .authorized(self.http.get(self.handle_url(handle)))
            .query(&[("partition", partition)])
            .send()
            .await
            .map_err(map_request_error)?;

        Ok(read_body(response).await?.payload.data)
    }
}

#[async_trait]
impl WarehouseClient for SnowflakeClient {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        debug!(
            "Executing statement with {} binding(s)",
            statement.bindings.len()
        );
        self.run(statement).await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Closed connection to {}", self.endpoint);
        Ok(())
    }
}

struct ApiBody {
    status: StatusCode,
    payload: ResultResponse,
}

async fn read_body(response: Response) -> Result<ApiBody> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| LensError::execution(format!("Failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(LensError::execution(format_api_error(status, &text)));
    }

    let payload: ResultResponse = serde_json::from_str(&text)
        .map_err(|e| LensError::execution(format!("Failed to parse response: {e}")))?;

    Ok(ApiBody { status, payload })
}

fn map_request_error(e: reqwest::Error) -> LensError {
    if e.is_timeout() {
        LensError::execution("Request timed out. Try again.")
    } else if e.is_connect() {
        LensError::execution(format!("Failed to reach the warehouse: {e}"))
    } else {
        LensError::execution(format!("Request failed: {e}"))
    }
}

/// Formats an error response, preferring the warehouse's own message.
fn format_api_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ResultResponse>(body) {
        Ok(ResultResponse {
            message: Some(message),
            code,
            sql_state,
            ..
        }) => {
            let mut text = format!("Snowflake API error ({status}): {message}");
            if let Some(code) = code {
                text.push_str(&format!(" [code {code}"));
                if let Some(state) = sql_state {
                    text.push_str(&format!(", SQL state {state}"));
                }
                text.push(']');
            }
            text
        }
        _ => format!("Snowflake API error ({status}): {}", body.trim()),
    }
}

/// Converts raw partition data into a typed, capped [`QueryResult`].
fn build_result(meta: &ResultSetMetaData, data: Vec<Vec<Option<String>>>) -> QueryResult {
    let columns: Vec<ColumnInfo> = meta
        .row_type
        .iter()
        .map(|c| ColumnInfo::new(&c.name, &c.kind))
        .collect();

    let total_rows = meta.num_rows.unwrap_or(data.len()).max(data.len());
    let was_truncated = total_rows > MAX_ROWS;

    let rows: Vec<Row> = data
        .into_iter()
        .take(MAX_ROWS)
        .map(|raw| {
            raw.into_iter()
                .zip(meta.row_type.iter())
                .map(|(cell, ty)| convert_value(cell, ty))
                .collect()
        })
        .collect();

    let row_count = rows.len();
    QueryResult {
        columns,
        rows,
        execution_time: Duration::ZERO,
        row_count,
        total_rows: Some(total_rows),
        was_truncated,
    }
}

/// Converts a cell, which the SQL API always encodes as a string, to a [`Value`].
fn convert_value(cell: Option<String>, ty: &RowType) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };

    match ty.kind.to_lowercase().as_str() {
        "fixed" if ty.scale.unwrap_or(0) == 0 => raw
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::String(raw)),
        "fixed" | "real" => raw
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::String(raw)),
        "boolean" => {
            let parsed = match raw.as_str() {
                "true" | "1" | "TRUE" => Some(true),
                "false" | "0" | "FALSE" => Some(false),
                _ => None,
            };
            parsed.map(Value::Bool).unwrap_or(Value::String(raw))
        }
        "variant" | "object" | "array" => serde_json::from_str(&raw)
            .map(Value::Json)
            .unwrap_or(Value::String(raw)),
        _ => Value::String(raw),
    }
}

// SQL API types

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, WireBinding>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultResponse {
    code: Option<String>,
    message: Option<String>,
    sql_state: Option<String>,
    statement_handle: Option<String>,
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    num_rows: Option<usize>,
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    scale: Option<i64>,
}
