use std::str::Utf8Error;

use crate::chronicle::IngestError;
use crate::config::ConfigError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("event body from {origin} is not valid UTF-8")]
    Encoding {
        origin: String,
        #[source]
        error: Utf8Error,
    },
    #[error("the log data from {origin} is malformed")]
    MalformedPayload {
        origin: String,
        #[source]
        error: MalformedPayload,
    },
    #[error("configuration error")]
    Configuration(#[from] ConfigError),
    #[error("unable to push the data to Chronicle")]
    Ingestion(#[source] IngestError),
}

/// Why an event body could not be read as a records envelope.
#[derive(thiserror::Error, Debug)]
pub enum MalformedPayload {
    #[error("not JSON serializable: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing `records` field")]
    MissingRecords,
}
