use commentary_protocol::event::{
    DEFAULT_EVENT_TYPE, DEFAULT_OPPONENT, DEFAULT_PLAYER, DEFAULT_TEAM,
};
use commentary_protocol::{CommentaryError, CommentaryResult, EventDescriptor, ExtraDetails};
use serde_json::{Map, Value};
use tracing::debug;

use crate::envelope::RawEventRecord;

/// Decode a record body into the JSON object it carries.
pub fn decode_record(record: &RawEventRecord) -> CommentaryResult<Map<String, Value>> {
    parse_event(record.decode_bytes()?)
}

/// Parse already base64-decoded bytes as a UTF-8 JSON object.
pub fn parse_event(bytes: Vec<u8>) -> CommentaryResult<Map<String, Value>> {
    let text = String::from_utf8(bytes)
        .map_err(|error| CommentaryError::MalformedRecord(format!("invalid utf-8: {error}")))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|error| CommentaryError::MalformedRecord(format!("invalid json: {error}")))?;
    match value {
        Value::Object(object) => Ok(object),
        other => Err(CommentaryError::MalformedRecord(format!(
            "expected a json object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Map a decoded event object to a descriptor. Never fails: absent or
/// unusable fields fall back to their defaults.
pub fn normalize_event(event: &Map<String, Value>) -> EventDescriptor {
    let event_type = text_field(event, "event_type").unwrap_or_else(|| DEFAULT_EVENT_TYPE.into());
    let extra_details = extra_details(&event_type, event);
    let descriptor = EventDescriptor {
        minute: minute_field(event),
        team: text_field(event, "event_team").unwrap_or_else(|| DEFAULT_TEAM.into()),
        player: text_field(event, "player").unwrap_or_else(|| DEFAULT_PLAYER.into()),
        opponent: text_field(event, "opponent").unwrap_or_else(|| DEFAULT_OPPONENT.into()),
        location: text_field(event, "location").unwrap_or_default(),
        is_goal: flag_field(event, "is_goal"),
        extra_details,
        event_type,
    };
    debug!(
        event_type = %descriptor.event_type,
        minute = descriptor.minute,
        has_extras = descriptor.extra_details.is_some(),
        "event normalized"
    );
    descriptor
}

fn extra_details(event_type: &str, event: &Map<String, Value>) -> Option<ExtraDetails> {
    let field = |key: &str| text_field(event, key).unwrap_or_default();
    match event_type {
        "Attempt" => Some(ExtraDetails::Attempt {
            shot_outcome: field("shot_outcome"),
            shot_place: field("shot_place"),
            bodypart: field("bodypart"),
            distance_to_goal: field("distance_to_goal"),
        }),
        "Yellow card" | "Red card" => Some(ExtraDetails::Card {
            card_type: event_type.to_owned(),
        }),
        "Substitution" => Some(ExtraDetails::Substitution {
            player_in: field("player_in"),
            player_out: field("player_out"),
        }),
        _ => None,
    }
}

/// Strings verbatim, scalars as their JSON text, `null` as absent.
fn text_field(event: &Map<String, Value>, key: &str) -> Option<String> {
    match event.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn minute_field(event: &Map<String, Value>) -> i64 {
    match event.get("minute") {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|minute| minute.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn flag_field(event: &Map<String, Value>, key: &str) -> bool {
    match event.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
        }
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
