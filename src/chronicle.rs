use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::auth::{AuthError, ServiceAccountKey};
use crate::config::Config;
use crate::process::LogRecord;

const BATCH_CREATE_PATH: &str = "/v2/unstructuredlogentries:batchCreate";
const OVERHEAD_PER_LOG_ESTIMATION: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("failed to authenticate with Chronicle - {0}")]
    Auth(#[from] AuthError),
    #[error("request to Chronicle failed - {0}")]
    Http(#[from] reqwest::Error),
    #[error("Chronicle rejected the request with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to serialize log record - {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sink for flattened log records. One call per invocation.
#[async_trait]
pub trait Ingest: Send + Sync {
    async fn ingest(&self, records: &[LogRecord], data_type: &str) -> Result<(), IngestError>;
}

pub type DynIngest = Arc<dyn Ingest>;

#[derive(Serialize)]
struct LogEntry {
    #[serde(rename = "logText")]
    log_text: String,
}

#[derive(Serialize)]
struct BatchCreateRequest<'a> {
    customer_id: &'a str,
    log_type: &'a str,
    entries: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

pub struct ChronicleClient {
    http: reqwest::Client,
    endpoint: String,
    customer_id: String,
    namespace: Option<String>,
    credentials: ServiceAccountKey,
    batch_max_size: usize,
}

impl ChronicleClient {
    pub fn new(
        endpoint: String,
        customer_id: String,
        namespace: Option<String>,
        credentials: ServiceAccountKey,
        batch_max_size: usize,
        request_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            customer_id,
            namespace,
            credentials,
            batch_max_size,
        })
    }

    async fn send_batch(
        &self,
        token: &str,
        data_type: &str,
        entries: Vec<LogEntry>,
    ) -> Result<(), IngestError> {
        let count = entries.len();
        let body = BatchCreateRequest {
            customer_id: &self.customer_id,
            log_type: data_type,
            entries,
            namespace: self.namespace.as_deref(),
        };

        let start = Instant::now();
        let response = self
            .http
            .post(format!("{}{}", self.endpoint, BATCH_CREATE_PATH))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "Chronicle rejected log batch");
            return Err(IngestError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent {} logs in {}ms", count, start.elapsed().as_millis());
        Ok(())
    }
}

#[async_trait]
impl Ingest for ChronicleClient {
    async fn ingest(&self, records: &[LogRecord], data_type: &str) -> Result<(), IngestError> {
        if records.is_empty() {
            info!("No logs to send");
            return Ok(());
        }

        let logs = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<String>, _>>()?;
        let batches = into_batches_of_estimated_size(logs, self.batch_max_size);

        info!(
            "Will send {} logs in {} requests. (On average {} logs per request)",
            records.len(),
            batches.len(),
            records.len() / batches.len()
        );

        let token = self.credentials.access_token(&self.http).await?;
        for batch in batches {
            let entries = batch
                .into_iter()
                .map(|log_text| LogEntry { log_text })
                .collect();
            self.send_batch(&token, data_type, entries).await?;
        }

        Ok(())
    }
}

pub fn set_up_chronicle_client(config: &Config) -> Result<DynIngest, crate::Error> {
    let client = ChronicleClient::new(
        config.endpoint.clone(),
        config.customer_id.clone(),
        config.namespace.clone(),
        config.service_account_key()?,
        config.batch_max_size,
        Duration::from_secs(config.request_timeout),
    )
    .map_err(crate::Error::Ingestion)?;

    Ok(Arc::new(client))
}

fn into_batches_of_estimated_size(logs: Vec<String>, target_batch_size: usize) -> Vec<Vec<String>> {
    // The request limit is 1MB; the size estimate only needs to keep us under it.
    let (mut batches, batch, _) = logs
        .into_iter()
        .fold::<(Vec<Vec<String>>, Vec<String>, usize), _>(
            (Vec::new(), Vec::new(), 0),
            |acc, log| {
                let (mut batches, mut batch, size) = acc;

                let new_size = size + log.len() + OVERHEAD_PER_LOG_ESTIMATION;
                if new_size <= target_batch_size || batch.is_empty() {
                    batch.push(log);
                    (batches, batch, new_size)
                } else {
                    batches.push(std::mem::take(&mut batch));
                    let new_size = log.len() + OVERHEAD_PER_LOG_ESTIMATION;
                    batch.push(log);
                    (batches, batch, new_size)
                }
            },
        );
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}
