use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use studio_common::{RawRecord, StoreConfig};

use crate::error::{ClientError, ClientResult};
use crate::response::decode_annotated_csv;

/// Anything that can execute a Flux query and hand back flat records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Run `query`; an empty result is an empty vector, not an error
    async fn fetch(&self, query: &str) -> ClientResult<Vec<RawRecord>>;
}

/// Request body for `POST /api/v2/query`
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Dialect {
    header: bool,
    delimiter: &'static str,
    annotations: [&'static str; 3],
    comment_prefix: &'static str,
    date_time_format: &'static str,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: ",",
            annotations: ["datatype", "group", "default"],
            comment_prefix: "#",
            date_time_format: "RFC3339",
        }
    }
}

/// Error payload returned by the InfluxDB API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Fetcher for the InfluxDB 2.x HTTP query API
///
/// Every call builds its own HTTP client and drops it before returning, so no
/// connection outlives a single query.
#[derive(Debug, Clone)]
pub struct InfluxFetcher {
    config: StoreConfig,
}

impl InfluxFetcher {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn query_url(&self) -> String {
        format!("{}/api/v2/query", self.config.url.trim_end_matches('/'))
    }

    fn build_client(&self) -> ClientResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout())
            .timeout(self.config.request_timeout())
            .build()?)
    }
}

#[async_trait]
impl RecordSource for InfluxFetcher {
    async fn fetch(&self, query: &str) -> ClientResult<Vec<RawRecord>> {
        let client = self.build_client()?;
        debug!("Running Flux query against {}:\n{}", self.config.url, query);

        let request = QueryRequest {
            query,
            kind: "flux",
            dialect: Dialect::default(),
        };

        let response = client
            .post(self.query_url())
            .query(&[("org", self.config.org.as_str())])
            .header(AUTHORIZATION, format!("Token {}", self.config.token))
            .header(ACCEPT, "application/csv")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(status, &response.text().await.unwrap_or_default());
            warn!("InfluxDB rejected query with {}: {}", status, message);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
                _ => ClientError::Query {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = response.text().await?;
        let records = decode_annotated_csv(&body)?;
        info!("Fetched {} records from bucket {}", records.len(), self.config.bucket);

        Ok(records)
    }
}

/// Extract a readable message from an error response body
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { code, message: Some(message) }) => match code {
            Some(code) => format!("{}: {}", code, message),
            None => message,
        },
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    }
}
