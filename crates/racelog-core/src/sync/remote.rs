//! Remote sink for race results (Supabase `PostgREST`).

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::models::ResultRecord;
use crate::util::compact_text;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote sync is not configured")]
    NotConfigured,
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Remote store did not confirm the insert: {0}")]
    Rejected(String),
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Confirmation that the remote store holds a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertAck {
    /// Rows the remote reported as written
    pub rows: usize,
    /// The remote already held a row with the same record key
    pub duplicate: bool,
}

/// Client for the remote persistence service
///
/// Inserts are at-least-once: callers retry after any failure, so a result
/// can reach the remote more than once. Each payload carries its
/// `record_key` so duplicates stay identifiable.
pub trait RemoteSink: Send + Sync + 'static {
    fn insert(&self, record: &ResultRecord) -> impl Future<Output = RemoteResult<InsertAck>> + Send;

    /// Ask the remote to recompute derived statistics. Best effort.
    fn trigger_aggregation(&self) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// `PostgREST` client for a Supabase project
#[derive(Clone)]
pub struct SupabaseSink {
    config: RemoteConfig,
    rest_url: String,
    client: Client,
}

impl SupabaseSink {
    pub fn new(config: RemoteConfig, timeout: Duration) -> RemoteResult<Self> {
        if config.table.trim().is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "results table must not be empty".to_string(),
            ));
        }

        let rest_url = format!("{}/rest/v1", config.url.trim_end_matches('/'));
        Ok(Self {
            config,
            rest_url,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Call a database function with the given named parameters.
    pub async fn call_function(
        &self,
        function: &str,
        params: &serde_json::Value,
    ) -> RemoteResult<()> {
        let request = self.authorized(
            self.client
                .post(format!("{}/rpc/{function}", self.rest_url))
                .json(params),
        );
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    fn insert_request(&self, record: &ResultRecord) -> RequestBuilder {
        let url = format!("{}/{}", self.rest_url, self.config.table);
        let request = match self.config.conflict_column.as_deref() {
            Some(column) => self
                .client
                .post(url)
                .query(&[("on_conflict", column)])
                .header("Prefer", "return=representation,resolution=ignore-duplicates"),
            None => self
                .client
                .post(url)
                .header("Prefer", "return=representation"),
        };
        self.authorized(request.json(record))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Accept", "application/json")
    }
}

impl RemoteSink for SupabaseSink {
    async fn insert(&self, record: &ResultRecord) -> RemoteResult<InsertAck> {
        let response = self.insert_request(record).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let rows = response.json::<Vec<serde_json::Value>>().await?;
        if rows.is_empty() {
            // With ignore-duplicates an empty body means the key was already there
            if self.config.conflict_column.is_some() {
                return Ok(InsertAck {
                    rows: 0,
                    duplicate: true,
                });
            }
            return Err(RemoteError::Rejected(
                "insert response contained no rows".to_string(),
            ));
        }

        Ok(InsertAck {
            rows: rows.len(),
            duplicate: false,
        })
    }

    async fn trigger_aggregation(&self) -> RemoteResult<()> {
        let Some(function) = self.config.aggregate_function.as_deref() else {
            return Ok(());
        };
        self.call_function(function, &serde_json::json!({})).await
    }
}

/// Sink for local-only mode: every insert fails with `NotConfigured`
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

impl RemoteSink for Unconfigured {
    async fn insert(&self, _record: &ResultRecord) -> RemoteResult<InsertAck> {
        Err(RemoteError::NotConfigured)
    }

    async fn trigger_aggregation(&self) -> RemoteResult<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.details.filter(|details| !details.trim().is_empty()) {
                Some(details) => format!(
                    "{} ({}): {}",
                    message.trim(),
                    status.as_u16(),
                    compact_text(&details)
                ),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_server::{respond_once, CannedResponse};
    use chrono::NaiveDate;

    fn record() -> ResultRecord {
        let mut record =
            ResultRecord::new(1, "Sprint", NaiveDate::from_ymd_opt(2024, 5, 18).unwrap());
        record.position = 1;
        record.race_time = Some(9.87);
        record
    }

    fn sink_for(url: &str, conflict_column: Option<&str>) -> SupabaseSink {
        let mut config = RemoteConfig::new(url, "anon-key")
            .unwrap()
            .with_aggregate_function("refresh_stats");
        config.conflict_column = conflict_column.map(str::to_string);
        SupabaseSink::new(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parse_api_error_prefers_postgrest_message() {
        let body = r#"{"code":"23505","message":"duplicate key","details":"Key exists"}"#;
        assert_eq!(
            parse_api_error(StatusCode::CONFLICT, body),
            "duplicate key (409): Key exists"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, "bad things"),
            "bad things (400)"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_posts_record_with_auth_headers() {
        let server = respond_once(CannedResponse::new(201, r#"[{"id": 1}]"#)).await;
        let sink = sink_for(&server.url(""), None);

        let ack = sink.insert(&record()).await.unwrap();
        assert_eq!(
            ack,
            InsertAck {
                rows: 1,
                duplicate: false
            }
        );

        let request = server.request().await;
        assert!(request.starts_with("POST /rest/v1/player_data "));
        assert!(request.contains("apikey: anon-key"));
        assert!(request.contains("authorization: Bearer anon-key"));
        assert!(request.contains("\"race_type\":\"Sprint\""));
        assert!(request.contains("\"record_key\""));
        assert!(!request.contains("\"synced\""));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_representation_is_rejected() {
        let server = respond_once(CannedResponse::new(201, "[]")).await;
        let sink = sink_for(&server.url(""), None);

        let error = sink.insert(&record()).await.unwrap_err();
        assert!(matches!(error, RemoteError::Rejected(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_representation_with_conflict_column_is_duplicate() {
        let server = respond_once(CannedResponse::new(201, "[]")).await;
        let sink = sink_for(&server.url(""), Some("record_key"));

        let ack = sink.insert(&record()).await.unwrap();
        assert!(ack.duplicate);

        let request = server.request().await;
        assert!(request.contains("on_conflict=record_key"));
        assert!(request.contains("resolution=ignore-duplicates"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn api_error_surfaces_status() {
        let server = respond_once(CannedResponse::new(
            401,
            r#"{"message":"Invalid API key"}"#,
        ))
        .await;
        let sink = sink_for(&server.url(""), None);

        let error = sink.insert(&record()).await.unwrap_err();
        assert_eq!(error.to_string(), "Remote API error: Invalid API key (401)");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_aggregation_calls_rpc() {
        let server = respond_once(CannedResponse::new(204, "")).await;
        let sink = sink_for(&server.url(""), None);

        sink.trigger_aggregation().await.unwrap();
        let request = server.request().await;
        assert!(request.starts_with("POST /rest/v1/rpc/refresh_stats "));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unconfigured_sink_always_fails_insert() {
        let error = Unconfigured.insert(&record()).await.unwrap_err();
        assert!(matches!(error, RemoteError::NotConfigured));
        Unconfigured.trigger_aggregation().await.unwrap();
    }
}
