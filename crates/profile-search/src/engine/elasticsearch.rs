use profile_search_data_processing::{ColumnKind, ProfileColumn, ProfileRecord};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::{BulkOutcome, EngineError, Result, SearchHits};
use crate::config::EngineConfig;
use crate::query::ProfileQuery;

/// Client for one Elasticsearch index over its REST API.
#[derive(Debug, Clone)]
pub struct ElasticsearchEngine {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.index, suffix)
    }

    /// Index mappings: text columns analysed, list columns as exact keywords.
    pub fn mappings() -> Value {
        let properties: Map<String, Value> = ProfileColumn::ALL
            .iter()
            .map(|column| {
                let field_type = match column.kind() {
                    ColumnKind::Text => "text",
                    ColumnKind::Keyword => "keyword",
                };
                (column.as_str().to_string(), json!({ "type": field_type }))
            })
            .collect();
        json!({ "mappings": { "properties": properties } })
    }

    /// Turn a non-2xx response into [`EngineError::Status`].
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn index_exists(&self) -> Result<bool> {
        let response = self
            .client
            .head(self.index_url(""))
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(response).await.map(|_| true),
        }
    }

    #[instrument(name = "Recreate Elasticsearch index", skip(self), fields(index = %self.index))]
    pub async fn recreate_index(&self) -> Result<()> {
        if self.index_exists().await? {
            let response = self
                .client
                .delete(self.index_url(""))
                .send()
                .await
                .map_err(EngineError::from_transport)?;
            Self::check(response).await?;
            info!("Deleted existing index");
        }

        let response = self
            .client
            .put(self.index_url(""))
            .json(&Self::mappings())
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        Self::check(response).await?;
        info!("Created index with mappings");
        Ok(())
    }

    /// Newline-delimited `_bulk` payload indexing every record.
    fn bulk_body(&self, records: &[ProfileRecord]) -> Result<String> {
        let action = serde_json::to_string(&json!({ "index": { "_index": self.index } }))?;
        let mut body = String::new();
        for record in records {
            body.push_str(&action);
            body.push('\n');
            body.push_str(&serde_json::to_string(&record.to_document())?);
            body.push('\n');
        }
        Ok(body)
    }

    /// Send one `_bulk` batch. Item-level failures are counted, not fatal.
    #[instrument(name = "Bulk index", skip_all, level = "debug", fields(batch = records.len()))]
    pub async fn index_documents(&self, records: &[ProfileRecord]) -> Result<BulkOutcome> {
        if records.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let response = self
            .client
            .post(self.index_url("/_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(self.bulk_body(records)?)
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        let response: Value = Self::check(response).await?.json().await?;
        Ok(parse_bulk_response(&response, records.len()))
    }

    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .client
            .post(self.index_url("/_refresh"))
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        Self::check(response).await?;
        debug!(index = %self.index, "Index refreshed");
        Ok(())
    }

    #[instrument(name = "Elasticsearch search", skip_all, level = "debug", fields(index = %self.index))]
    pub async fn search(&self, query: &ProfileQuery) -> Result<SearchHits> {
        let body = query.to_elasticsearch_body();
        debug!(%body, "Search request");
        let response = self
            .client
            .post(self.index_url("/_search"))
            .json(&body)
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        let response: Value = Self::check(response).await?.json().await?;
        parse_search_response(response)
    }

    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/_cluster/health", self.base_url))
            .send()
            .await
            .map_err(EngineError::from_transport)?;
        Self::check(response).await?;
        Ok(())
    }
}

fn parse_bulk_response(response: &Value, sent: usize) -> BulkOutcome {
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        warn!("Bulk response has no items; counting the whole batch as failed");
        return BulkOutcome {
            indexed: 0,
            failed: sent,
        };
    };
    let failed = items
        .iter()
        .filter_map(|item| item.get("index"))
        .filter(|result| result.get("error").is_some())
        .inspect(|result| warn!(error = %result["error"], "Document rejected"))
        .count();
    BulkOutcome {
        indexed: items.len() - failed,
        failed,
    }
}

/// Read `hits.total.value` and each hit's `_source`, moving `highlight` to `_highlight`.
fn parse_search_response(mut response: Value) -> Result<SearchHits> {
    let total = response
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .ok_or_else(|| EngineError::UnexpectedResponse("missing hits.total.value".to_string()))?;

    let hits = match response.pointer_mut("/hits/hits").map(Value::take) {
        Some(Value::Array(hits)) => hits,
        _ => return Err(EngineError::UnexpectedResponse("missing hits.hits".to_string())),
    };

    let results = hits
        .into_iter()
        .map(|mut hit| {
            let mut doc = match hit.get_mut("_source").map(Value::take) {
                Some(Value::Object(source)) => source,
                _ => Map::new(),
            };
            if let Some(highlight) = hit.get_mut("highlight").map(Value::take) {
                doc.insert("_highlight".to_string(), highlight);
            }
            doc
        })
        .collect();

    Ok(SearchHits { total, results })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mappings() {
        assert_eq!(
            ElasticsearchEngine::mappings(),
            json!({
                "mappings": {
                    "properties": {
                        "full_name": {"type": "text"},
                        "job_title": {"type": "text"},
                        "industry": {"type": "text"},
                        "summary": {"type": "text"},
                        "location_country": {"type": "text"},
                        "education": {"type": "keyword"},
                        "experience": {"type": "keyword"},
                        "skills": {"type": "keyword"},
                        "job_summary": {"type": "text"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let engine = ElasticsearchEngine::new(&EngineConfig::default()).unwrap();
        let record = ProfileRecord {
            full_name: "Randall Evans".into(),
            skills: "Python | SQL".into(),
            ..Default::default()
        };
        let body = engine.bulk_body(&[record.clone(), record]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action, json!({"index": {"_index": "linkedin_profiles"}}));
        let doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["skills"], json!(["Python", "SQL"]));
        assert_eq!(doc["full_name"], json!("Randall Evans"));
    }

    #[test]
    fn test_parse_search_response() {
        let response = json!({
            "took": 3,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {
                        "_id": "a",
                        "_score": 1.2,
                        "_source": {"full_name": "Ali Ahmad", "skills": ["Python"]},
                        "highlight": {"summary": ["<em>ali</em> works on data quality"]}
                    },
                    {"_id": "b", "_score": 0.4, "_source": {"full_name": "Maria Lopez"}}
                ]
            }
        });
        let hits = parse_search_response(response).unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(hits.results.len(), 2);
        assert_eq!(
            hits.results[0]["_highlight"],
            json!({"summary": ["<em>ali</em> works on data quality"]})
        );
        assert!(!hits.results[1].contains_key("_highlight"));
        assert_eq!(hits.results[1]["full_name"], json!("Maria Lopez"));
    }

    #[test]
    fn test_parse_search_response_rejects_garbage() {
        assert!(matches!(
            parse_search_response(json!({"error": "nope"})),
            Err(EngineError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_bulk_response_counts_failures() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"status": 201}},
                {"index": {"status": 400, "error": {"type": "mapper_parsing_exception"}}},
                {"index": {"status": 201}}
            ]
        });
        assert_eq!(
            parse_bulk_response(&response, 3),
            BulkOutcome { indexed: 2, failed: 1 }
        );
        assert_eq!(
            parse_bulk_response(&json!({}), 3),
            BulkOutcome { indexed: 0, failed: 3 }
        );
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_unavailable() {
        let config = EngineConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..EngineConfig::default()
        };
        let engine = ElasticsearchEngine::new(&config).unwrap();
        assert!(matches!(
            engine.health().await,
            Err(EngineError::Unavailable(_))
        ));
    }
}
