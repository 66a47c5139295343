//! Persisted conversation state and its read-side projection.

use crate::ids::{RecordId, SessionKey};
use crate::message::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned to display consumers when no state has been stored yet.
pub const NO_DATA_SENTINEL: &str = "No data available";

/// Timestamp format shown to display consumers.
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The stored conversation for one session key.
///
/// Stored shape is `{id, comment, timestamp, processed_records}`. The whole
/// record is replaced on every save; it is never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: SessionKey,
    /// Ordered history, oldest first.
    pub comment: Vec<Message>,
    pub timestamp: DateTime<Utc>,
    /// Most recent record ids that already contributed to `comment`.
    #[serde(default)]
    pub processed_records: Vec<RecordId>,
}

impl ConversationState {
    pub fn new(id: SessionKey, history: Vec<Message>, generated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            comment: history,
            timestamp: generated_at,
            processed_records: Vec::new(),
        }
    }

    /// Text of the last message in the history.
    pub fn latest_commentary(&self) -> Option<String> {
        self.comment.last().map(Message::text_content)
    }

    pub fn has_processed(&self, record_id: &RecordId) -> bool {
        self.processed_records.contains(record_id)
    }

    /// Remember `record_id`, keeping at most `capacity` ids (oldest dropped first).
    pub fn remember_record(&mut self, record_id: RecordId, capacity: usize) {
        if capacity == 0 {
            self.processed_records.clear();
            return;
        }
        if !self.has_processed(&record_id) {
            self.processed_records.push(record_id);
        }
        let excess = self.processed_records.len().saturating_sub(capacity);
        self.processed_records.drain(..excess);
    }
}

/// Bound on the number of history messages kept between invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    /// `None` keeps the full history.
    pub max_messages: Option<usize>,
}

impl HistoryWindow {
    pub fn unbounded() -> Self {
        Self { max_messages: None }
    }

    /// A window of at most `max_messages`, never smaller than one prompt/reply pair.
    pub fn bounded(max_messages: usize) -> Self {
        Self {
            max_messages: Some(max_messages.max(2)),
        }
    }

    /// Evict the oldest messages until the history fits the window.
    ///
    /// Eviction removes whole prompt/reply pairs so the kept history still
    /// starts with a user message.
    pub fn apply(&self, history: &mut Vec<Message>) {
        let Some(max) = self.max_messages else {
            return;
        };
        if history.len() <= max {
            return;
        }
        let mut evict = history.len() - max;
        evict += evict % 2;
        while evict < history.len() && history[evict].role != Role::User {
            evict += 1;
        }
        history.drain(..evict.min(history.len()));
    }
}

/// Read-side view served to display consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayView {
    pub comment: String,
    pub timestamp: Option<String>,
}

impl DisplayView {
    pub fn from_state(state: Option<&ConversationState>) -> Self {
        match state.and_then(|state| {
            state
                .latest_commentary()
                .map(|comment| (comment, state.timestamp))
        }) {
            Some((comment, timestamp)) => Self {
                comment,
                timestamp: Some(timestamp.format(DISPLAY_TIMESTAMP_FORMAT).to_string()),
            },
            None => Self::no_data(),
        }
    }

    pub fn no_data() -> Self {
        Self {
            comment: NO_DATA_SENTINEL.to_owned(),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn turns(pairs: usize) -> Vec<Message> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Message::user_text(format!("prompt {i}")),
                    Message::assistant_text(format!("reply {i}")),
                ]
            })
            .collect()
    }

    #[test]
    fn unbounded_window_keeps_everything() {
        let mut history = turns(50);
        HistoryWindow::unbounded().apply(&mut history);
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn bounded_window_evicts_oldest_pairs() {
        let mut history = turns(5);
        HistoryWindow::bounded(4).apply(&mut history);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].text_content(), "prompt 3");
        assert_eq!(history[3].text_content(), "reply 4");
    }

    #[test]
    fn odd_window_still_starts_with_user() {
        let mut history = turns(3);
        HistoryWindow::bounded(3).apply(&mut history);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
    }

    #[test]
    fn window_is_at_least_one_pair() {
        assert_eq!(HistoryWindow::bounded(0).max_messages, Some(2));
    }

    #[test]
    fn remember_record_is_bounded_and_idempotent() {
        let mut state = ConversationState::new(SessionKey::latest(), Vec::new(), Utc::now());
        for id in ["a", "b", "b", "c", "d"] {
            state.remember_record(RecordId::from(id), 3);
        }
        let ids: Vec<&str> = state
            .processed_records
            .iter()
            .map(RecordId::as_str)
            .collect();
        assert_eq!(ids, ["b", "c", "d"]);
        assert!(!state.has_processed(&RecordId::from("a")));
    }

    #[test]
    fn stored_shape_uses_id_comment_timestamp() {
        let state = ConversationState::new(SessionKey::latest(), turns(1), Utc::now());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["id"], "latest");
        assert_eq!(json["comment"].as_array().map(Vec::len), Some(2));
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn legacy_state_without_processed_records_deserializes() {
        let json = serde_json::json!({
            "id": "latest",
            "comment": [],
            "timestamp": "2024-08-10T15:04:05Z"
        });
        let state: ConversationState = serde_json::from_value(json).unwrap();
        assert!(state.processed_records.is_empty());
    }

    #[test]
    fn display_view_shows_last_reply() {
        let at = Utc.with_ymd_and_hms(2024, 8, 10, 15, 4, 5).unwrap();
        let state = ConversationState::new(SessionKey::latest(), turns(2), at);
        let view = DisplayView::from_state(Some(&state));
        assert_eq!(view.comment, "reply 1");
        assert_eq!(view.timestamp.as_deref(), Some("2024-08-10 15:04:05"));
    }

    #[test]
    fn display_view_falls_back_to_sentinel() {
        assert_eq!(DisplayView::from_state(None).comment, NO_DATA_SENTINEL);
        let empty = ConversationState::new(SessionKey::latest(), Vec::new(), Utc::now());
        assert_eq!(DisplayView::from_state(Some(&empty)), DisplayView::no_data());
    }
}
