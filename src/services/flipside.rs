use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};

use crate::config::FlipsideConfig;
use crate::error::UpstreamError;
use crate::models::trade::{ChainFamily, RawTradeRow};
use crate::services::pipeline_config::QueryScope;
use crate::services::trade_source::{build_trade_query, TradeSource};

const RESULT_TTL_HOURS: u32 = 1;

/// Flipside JSON-RPC client: submit a SQL run, poll it, then page through results
#[derive(Clone)]
pub struct FlipsideService {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRunEnvelope {
    query_run: QueryRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRun {
    id: String,
    state: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultsPage {
    #[serde(default)]
    column_names: Option<Vec<String>>,
    #[serde(default)]
    rows: Option<Vec<Value>>,
    #[serde(default)]
    page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_pages: u32,
}

/// Lifecycle of a query run as reported by `getQueryRun`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending,
    Success,
    Failed,
}

impl RunState {
    fn from_str(s: &str) -> Self {
        match s {
            "QUERY_STATE_SUCCESS" => RunState::Success,
            "QUERY_STATE_FAILED" | "QUERY_STATE_CANCELED" => RunState::Failed,
            _ => RunState::Pending,
        }
    }
}

impl FlipsideService {
    pub fn new(config: &FlipsideConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.request_timeout)
                .build()?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
            page_size: config.page_size,
        })
    }

    /// Run `sql` to completion and return every result row as a JSON object
    pub async fn run_query(&self, sql: &str) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        let run_id = self.create_query_run(sql).await?;
        self.wait_for_run(&run_id).await?;
        self.fetch_all_results(&run_id).await
    }

    async fn create_query_run(&self, sql: &str) -> Result<String, UpstreamError> {
        let params = json!([{
            "resultTTLHours": RESULT_TTL_HOURS,
            "maxAgeMinutes": 0,
            "sql": sql,
            "tags": { "source": "bubblemap-backend" },
            "dataSource": "snowflake-default",
            "dataProvider": "flipside"
        }]);

        let created: QueryRunEnvelope = self.rpc("createQueryRun", params).await?;
        tracing::info!("Submitted Flipside query run {}", created.query_run.id);

        Ok(created.query_run.id)
    }

    async fn wait_for_run(&self, run_id: &str) -> Result<(), UpstreamError> {
        let started = Instant::now();

        loop {
            let status: QueryRunEnvelope = self.rpc("getQueryRun", json!([{ "queryRunId": run_id }])).await?;

            match RunState::from_str(&status.query_run.state) {
                RunState::Success => {
                    tracing::debug!("Query run {} finished in {:?}", run_id, started.elapsed());
                    return Ok(());
                }
                RunState::Failed => {
                    return Err(UpstreamError::QueryFailed {
                        state: status.query_run.state,
                        message: status.query_run.error_message.unwrap_or_default(),
                    });
                }
                RunState::Pending => {
                    if started.elapsed() >= self.max_wait {
                        tracing::warn!("Query run {} still {} after {:?}", run_id, status.query_run.state, self.max_wait);
                        return Err(UpstreamError::Timeout(self.max_wait));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn fetch_all_results(&self, run_id: &str) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        let mut records = Vec::new();
        let mut page_number = 1u32;

        loop {
            let params = json!([{
                "queryRunId": run_id,
                "format": "json",
                "page": { "number": page_number, "size": self.page_size }
            }]);

            let page: QueryResultsPage = self.rpc("getQueryRunResults", params).await?;
            let total_pages = page.page.as_ref().map(|p| p.total_pages).unwrap_or(1);

            let columns = page.column_names.unwrap_or_default();
            for row in page.rows.unwrap_or_default() {
                records.push(row_to_object(&columns, row)?);
            }

            tracing::debug!("Fetched results page {}/{} for run {}", page_number, total_pages, run_id);

            if page_number >= total_pages {
                break;
            }
            page_number += 1;
        }

        Ok(records)
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, UpstreamError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(format!("{}/json-rpc", self.base_url))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(format!("{} response: {}", method, e)))?;

        if let Some(err) = envelope.error {
            return Err(UpstreamError::Rpc(match err.code {
                Some(code) => format!("{} ({})", err.message, code),
                None => err.message,
            }));
        }

        envelope
            .result
            .ok_or_else(|| UpstreamError::Decode(format!("{} response has no result", method)))
    }
}

#[async_trait]
impl TradeSource for FlipsideService {
    async fn fetch_trades(&self, scope: &QueryScope) -> Result<Vec<RawTradeRow>, UpstreamError> {
        let sql = build_trade_query(scope);
        let objects = self.run_query(&sql).await?;

        tracing::info!(
            "Flipside returned {} rows for {} on {}",
            objects.len(),
            scope.token_address,
            scope.chain.as_str()
        );

        Ok(decode_rows(scope.chain.family(), objects))
    }

    fn source_name(&self) -> &str {
        "flipside"
    }
}

fn status_error(status: StatusCode, body: String) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        _ => UpstreamError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

/// Result rows come back either as objects or as arrays aligned with
/// `columnNames`. Column names are lowercased either way.
fn row_to_object(columns: &[String], row: Value) -> Result<Map<String, Value>, UpstreamError> {
    match row {
        Value::Object(obj) => Ok(obj.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()),
        Value::Array(values) => {
            if values.len() != columns.len() {
                return Err(UpstreamError::Decode(format!(
                    "row has {} values but {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            Ok(columns.iter().map(|c| c.to_lowercase()).zip(values).collect())
        }
        other => Err(UpstreamError::Decode(format!("unexpected row shape: {}", other))),
    }
}

/// Rows that do not fit the family's shape are kept as `Undecodable` so the
/// normalizer counts them instead of failing the whole batch
fn decode_rows(family: ChainFamily, objects: Vec<Map<String, Value>>) -> Vec<RawTradeRow> {
    objects
        .into_iter()
        .map(|obj| RawTradeRow::decode(family, Value::Object(obj)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_rows_zipped_with_columns() {
        let columns = vec!["FROM_ADDRESS".to_string(), "AMOUNT_USD".to_string()];
        let obj = row_to_object(&columns, json!(["0xabc", 12.5])).unwrap();

        assert_eq!(obj["from_address"], json!("0xabc"));
        assert_eq!(obj["amount_usd"], json!(12.5));
    }

    #[test]
    fn test_object_rows_keys_lowercased() {
        let obj = row_to_object(&[], json!({"SWAPPER": "Wallet1", "mint": null})).unwrap();
        assert_eq!(obj["swapper"], json!("Wallet1"));
        assert!(obj["mint"].is_null());
    }

    #[test]
    fn test_mismatched_row_width_is_decode_error() {
        let columns = vec!["a".to_string()];
        let err = row_to_object(&columns, json!([1, 2])).unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));

        let err = row_to_object(&columns, json!("nope")).unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[test]
    fn test_decode_rows_by_family() {
        let objects = vec![
            row_to_object(
                &[],
                json!({
                    "from_address": "0xabc",
                    "to_address": "0xdef",
                    "contract_address": "0xtoken",
                    "amount_usd": "10.5",
                    "block_timestamp": "2024-03-01 00:00:00.000"
                }),
            )
            .unwrap(),
        ];

        let rows = decode_rows(ChainFamily::Evm, objects);
        match &rows[0] {
            RawTradeRow::Evm(row) => assert_eq!(row.token_address.as_deref(), Some("0xtoken")),
            _ => panic!("expected EVM row"),
        }
    }

    #[test]
    fn test_bad_row_kept_alongside_good_rows() {
        let columns = vec![
            "FROM_ADDRESS".to_string(),
            "AMOUNT_USD".to_string(),
            "BLOCK_TIMESTAMP".to_string(),
        ];
        let objects = vec![
            row_to_object(&columns, json!(["0xabc", 10, "2024-03-01 00:00:00.000"])).unwrap(),
            row_to_object(&columns, json!([12345, 10, "2024-03-01 00:00:00.000"])).unwrap(),
        ];

        let rows = decode_rows(ChainFamily::Evm, objects);

        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0], RawTradeRow::Evm(_)));
        assert!(matches!(rows[1], RawTradeRow::Undecodable(_)));
    }

    #[test]
    fn test_client_built_with_timeout() {
        let config = FlipsideConfig {
            api_key: "key".to_string(),
            base_url: "https://example.invalid/".to_string(),
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            page_size: 100,
        };

        let service = FlipsideService::new(&config).unwrap();
        assert_eq!(service.base_url, "https://example.invalid");
        assert_eq!(service.source_name(), "flipside");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            UpstreamError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            UpstreamError::Unauthorized { status: 403 }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            UpstreamError::RateLimited
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "down".to_string()),
            UpstreamError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_run_state() {
        assert_eq!(RunState::from_str("QUERY_STATE_SUCCESS"), RunState::Success);
        assert_eq!(RunState::from_str("QUERY_STATE_CANCELED"), RunState::Failed);
        assert_eq!(RunState::from_str("QUERY_STATE_RUNNING"), RunState::Pending);
        assert_eq!(RunState::from_str("QUERY_STATE_READY"), RunState::Pending);
    }
}
