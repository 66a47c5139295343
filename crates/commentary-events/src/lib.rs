//! Stream input handling: the batch envelope, record decoding, and the
//! event normalizer.

mod envelope;
mod normalize;

pub use envelope::{KinesisBatch, KinesisData, KinesisRecord, RawEventRecord};
pub use normalize::{decode_record, normalize_event, parse_event};
