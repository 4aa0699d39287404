use crate::models::{BulkOutcome, IndexBatch, RejectedDocument, SearchHit};
use crate::query::MatchQuery;
use crate::traits::DocumentIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const BACKEND: &str = "opensearch";

pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
}

impl OpenSearchStore {
    /// Builds the endpoint from its parts and bounds every request by `timeout`.
    pub fn from_parts(
        scheme: &str,
        host: &str,
        port: u16,
        index_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let endpoint = Url::parse(&format!("{scheme}://{host}:{port}"))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.endpoint, self.index_name, suffix)
    }
}

#[async_trait]
impl DocumentIndex for OpenSearchStore {
    async fn ping(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(SearchError::Unavailable(format!(
                "{} answered ping with {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
    }

    async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .head(self.index_url(""))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.index_url(""))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        "title": {
                            "type": "text",
                            "fields": {"keyword": {"type": "keyword", "ignore_above": 256}}
                        },
                        "content": {"type": "text"}
                    }
                }
            }))
            .send()
            .await
            .map_err(transport_error)?;

        // A concurrent creator wins the race with a 400 resource_already_exists_exception.
        if response.status() == StatusCode::BAD_REQUEST {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let kind = body
                .pointer("/error/type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if kind == "resource_already_exists_exception" {
                return Ok(());
            }
            return Err(SearchError::Request(format!(
                "open-search index setup failed: {kind}"
            )));
        }

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "open-search index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn put_refresh_interval(&self, interval: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.index_url("/_settings"))
            .json(&json!({"index": {"refresh_interval": interval}}))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("refresh_interval={interval}: {}", response.status()),
            });
        }
        Ok(())
    }

    async fn bulk_index(&self, batch: &IndexBatch) -> Result<BulkOutcome, SearchError> {
        if batch.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let payload = bulk_payload(&self.index_name, batch)?;

        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        Ok(parse_bulk_response(batch, &response_json))
    }

    async fn refresh(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .post(self.index_url("/_refresh"))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("refresh: {}", response.status()),
            });
        }
        Ok(())
    }

    async fn search(&self, query: &MatchQuery) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(self.index_url("/_search"))
            .json(&query.to_request_body())
            .send()
            .await
            .map_err(transport_error)?;

        // Nothing has been ingested yet.
        if response.status() == StatusCode::NOT_FOUND {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            if is_missing_index(&body) {
                return Ok(Vec::new());
            }
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: StatusCode::NOT_FOUND.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        Ok(parse_search_hits(&response_json))
    }
}

fn transport_error(error: reqwest::Error) -> SearchError {
    if error.is_connect() {
        SearchError::Unavailable(error.to_string())
    } else {
        SearchError::Http(error)
    }
}

fn bulk_payload(index_name: &str, batch: &IndexBatch) -> Result<String, serde_json::Error> {
    let mut lines = Vec::with_capacity(batch.len() * 2);
    for (position, document) in batch.documents().iter().enumerate() {
        lines.push(serde_json::to_string(&json!({
            "index": {"_index": index_name, "_id": batch.document_id(position)}
        }))?);
        lines.push(serde_json::to_string(document)?);
    }

    Ok(lines.join("\n") + "\n")
}

/// Items come back in submission order, one per document.
fn parse_bulk_response(batch: &IndexBatch, response: &Value) -> BulkOutcome {
    let items = response
        .pointer("/items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut outcome = BulkOutcome::default();
    for (position, document) in batch.documents().iter().enumerate() {
        let Some(item) = items.get(position) else {
            outcome.rejected.push(RejectedDocument {
                title: document.title.clone(),
                reason: "missing bulk item status".to_string(),
            });
            continue;
        };

        let status = item
            .pointer("/index/status")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        match item.pointer("/index/error") {
            Some(error) if !error.is_null() => outcome.rejected.push(RejectedDocument {
                title: document.title.clone(),
                reason: describe_item_error(error, status),
            }),
            _ if (200..300).contains(&status) => outcome.indexed.push(document.title.clone()),
            _ => outcome.rejected.push(RejectedDocument {
                title: document.title.clone(),
                reason: format!("status {status}"),
            }),
        }
    }

    outcome
}

fn describe_item_error(error: &Value, status: u64) -> String {
    let kind = error
        .pointer("/type")
        .and_then(Value::as_str)
        .unwrap_or("error");
    match error.pointer("/reason").and_then(Value::as_str) {
        Some(reason) => format!("{kind} ({status}): {reason}"),
        None => format!("{kind} ({status})"),
    }
}

fn is_missing_index(body: &Value) -> bool {
    body.pointer("/error/type").and_then(Value::as_str) == Some("index_not_found_exception")
}

fn parse_search_hits(response: &Value) -> Vec<SearchHit> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|raw| {
            let field = |name: &str| {
                raw.pointer(&format!("/_source/{name}"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            SearchHit {
                title: field("title"),
                content: field("content"),
            }
        })
        .collect()
}
