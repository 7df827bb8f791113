use aws_lambda_events::event::kafka::{KafkaEvent, KafkaRecord};
use base64::prelude::*;
use itertools::Itertools;
use std::fmt;
use tracing::debug;

/// Delivery position of a message on the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub topic: Option<String>,
    pub partition: i64,
    pub offset: i64,
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}[{}]@{}",
            self.topic.as_deref().unwrap_or("unknown"),
            self.partition,
            self.offset
        )
    }
}

/// One message delivered by the trigger. Only `body` is interpreted.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub body: Vec<u8>,
    pub metadata: EventMetadata,
}

impl RawEvent {
    pub fn new(body: impl Into<Vec<u8>>, metadata: EventMetadata) -> Self {
        Self {
            body: body.into(),
            metadata,
        }
    }

    pub fn origin(&self) -> String {
        self.metadata.to_string()
    }
}

pub type EventBatch = Vec<RawEvent>;

impl From<KafkaRecord> for RawEvent {
    fn from(record: KafkaRecord) -> Self {
        // values are base64 encoded by the event source mapping, but fall back to
        // the raw value the same way plain text kafka payloads are handled
        let body = match record.value {
            Some(value) => match BASE64_STANDARD.decode(&value) {
                Ok(decoded) => decoded,
                Err(_) => value.into_bytes(),
            },
            None => Vec::new(),
        };

        RawEvent {
            body,
            metadata: EventMetadata {
                topic: record.topic,
                partition: record.partition,
                offset: record.offset,
            },
        }
    }
}

/// Flattens the per-partition record map into a single batch. Partitions are
/// visited in key order so the batch order is stable; records keep their
/// delivery order within a partition.
pub fn batch_from_kafka(event: KafkaEvent) -> EventBatch {
    event
        .records
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .flat_map(|(topic_partition, records)| {
            debug!("Kafka records: {topic_partition} --> {}", records.len());
            records.into_iter().map(RawEvent::from)
        })
        .collect()
}
