use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::chronicle::DynIngest;
use crate::error::{Error, MalformedPayload};
use crate::events::{EventBatch, RawEvent};

/// A single log entry. Its content is passed through untouched.
pub type LogRecord = Value;

/// The `records` field of an event body, resolved once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordsEnvelope {
    Single(LogRecord),
    Batch(Vec<LogRecord>),
}

impl RecordsEnvelope {
    pub fn parse(text: &str) -> Result<Self, MalformedPayload> {
        let mut map = match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => return Err(MalformedPayload::NotAnObject),
        };

        match map.remove("records") {
            Some(Value::Array(records)) => Ok(RecordsEnvelope::Batch(records)),
            Some(record) => Ok(RecordsEnvelope::Single(record)),
            None => Err(MalformedPayload::MissingRecords),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordsEnvelope::Single(_) => 1,
            RecordsEnvelope::Batch(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append_to(self, logs: &mut Vec<LogRecord>) {
        match self {
            RecordsEnvelope::Single(record) => logs.push(record),
            RecordsEnvelope::Batch(mut records) => logs.append(&mut records),
        }
    }
}

fn decode(event: &RawEvent) -> Result<RecordsEnvelope, Error> {
    let text = std::str::from_utf8(&event.body).map_err(|error| Error::Encoding {
        origin: event.origin(),
        error,
    })?;

    RecordsEnvelope::parse(text).map_err(|error| Error::MalformedPayload {
        origin: event.origin(),
        error,
    })
}

/// Decodes every event in the batch and merges their records into one
/// sequence, in batch order. The first bad event fails the whole batch.
pub fn flatten(batch: &EventBatch) -> Result<Vec<LogRecord>, Error> {
    let mut logs = Vec::new();
    for event in batch {
        let envelope = decode(event).inspect_err(|error| error!(?error, "Failed to parse event"))?;
        debug!(
            "Records from {}: {} ({})",
            event.origin(),
            envelope.len(),
            match envelope {
                RecordsEnvelope::Single(_) => "single",
                RecordsEnvelope::Batch(_) => "array",
            }
        );
        envelope.append_to(&mut logs);
    }
    Ok(logs)
}

/// Normalizes event batches and forwards them to the ingestion sink with a
/// fixed data type.
pub struct Forwarder {
    data_type: String,
    ingestor: DynIngest,
}

impl Forwarder {
    pub fn new(data_type: impl Into<String>, ingestor: DynIngest) -> Self {
        Self {
            data_type: data_type.into(),
            ingestor,
        }
    }

    /// Returns the number of records forwarded.
    pub async fn process(&self, batch: EventBatch) -> Result<usize, Error> {
        info!("Received {} events", batch.len());

        let logs = flatten(&batch)?;
        info!(
            "Parsed {} records from {} events. Sending them to Chronicle as {}",
            logs.len(),
            batch.len(),
            self.data_type
        );

        let start = Instant::now();
        self.ingestor
            .ingest(&logs, &self.data_type)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to ingest logs");
                Error::Ingestion(e)
            })?;

        info!(
            "Total {} log(s) successfully ingested to Chronicle in {}ms",
            logs.len(),
            start.elapsed().as_millis()
        );
        Ok(logs.len())
    }
}
