use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use commentary_protocol::{CommentaryError, CommentaryResult, RecordId};
use serde::{Deserialize, Serialize};

/// A batch as delivered by the stream transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinesisBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<KinesisRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KinesisRecord {
    pub kinesis: KinesisData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisData {
    /// Base64-encoded record body.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

impl KinesisBatch {
    pub fn into_records(self) -> Vec<RawEventRecord> {
        self.records
            .into_iter()
            .map(|record| RawEventRecord {
                data: record.kinesis.data,
                sequence_number: record.kinesis.sequence_number,
                partition_key: record.kinesis.partition_key,
            })
            .collect()
    }

    /// Build a batch from plain JSON payloads, encoding each one.
    pub fn from_payloads<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> Self {
        Self {
            records: payloads
                .into_iter()
                .map(|payload| KinesisRecord {
                    kinesis: KinesisData {
                        data: STANDARD.encode(payload),
                        sequence_number: None,
                        partition_key: None,
                    },
                })
                .collect(),
        }
    }
}

/// One opaque record body plus the transport metadata that travels with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRecord {
    pub data: String,
    pub sequence_number: Option<String>,
    pub partition_key: Option<String>,
}

impl RawEventRecord {
    pub fn from_payload(payload: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(payload),
            sequence_number: None,
            partition_key: None,
        }
    }

    pub fn with_sequence_number(mut self, sequence_number: impl Into<String>) -> Self {
        self.sequence_number = Some(sequence_number.into());
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Transport identity of the record: the sequence number, scoped by the
    /// partition key when one is set. `None` when the transport supplied no
    /// sequence number; such records are never treated as redeliveries.
    pub fn record_id(&self) -> Option<RecordId> {
        let sequence_number = self.sequence_number.as_deref()?;
        Some(match self.partition_key.as_deref() {
            Some(partition_key) => {
                RecordId::from_string(format!("{partition_key}/{sequence_number}"))
            }
            None => RecordId::from_string(sequence_number),
        })
    }

    pub fn decode_bytes(&self) -> CommentaryResult<Vec<u8>> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|error| CommentaryError::MalformedRecord(format!("invalid base64: {error}")))
    }
}
