use std::sync::Arc;

use chrono::{DateTime, Utc};
use commentary_protocol::{
    CommentaryError, CommentaryResult, ConversationState, KeyValueStorePort, Message, SessionKey,
};
use tracing::{debug, instrument};

/// Reads and replaces the conversation state stored under a session key.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn KeyValueStorePort>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn KeyValueStorePort>) -> Self {
        Self { backend }
    }

    /// Stored history for `key`, oldest first. Empty when nothing is stored yet.
    pub async fn load(&self, key: &SessionKey) -> CommentaryResult<Vec<Message>> {
        Ok(self
            .load_state(key)
            .await?
            .map(|state| state.comment)
            .unwrap_or_default())
    }

    #[instrument(skip(self), fields(session_key = %key))]
    pub async fn load_state(&self, key: &SessionKey) -> CommentaryResult<Option<ConversationState>> {
        let Some(item) = self.backend.get(key.as_str()).await? else {
            debug!("no stored conversation");
            return Ok(None);
        };
        let state: ConversationState = serde_json::from_value(item).map_err(|error| {
            CommentaryError::InvalidState(format!("stored conversation for {key}: {error}"))
        })?;
        debug!(history_len = state.comment.len(), "conversation loaded");
        Ok(Some(state))
    }

    /// Replace the state under `key` with `history` stamped at `generated_at`.
    pub async fn save(
        &self,
        key: &SessionKey,
        history: Vec<Message>,
        generated_at: DateTime<Utc>,
    ) -> CommentaryResult<ConversationState> {
        let state = ConversationState::new(key.clone(), history, generated_at);
        self.save_state(&state).await?;
        Ok(state)
    }

    /// Replace the stored record with `state` in a single overwrite.
    ///
    /// The previous record is never deleted first, so a failed write leaves
    /// the last good version in place.
    #[instrument(
        skip(self, state),
        fields(session_key = %state.id, history_len = state.comment.len())
    )]
    pub async fn save_state(&self, state: &ConversationState) -> CommentaryResult<()> {
        let item = serde_json::to_value(state)?;
        self.backend.put(state.id.as_str(), item).await?;
        debug!("conversation replaced");
        Ok(())
    }

    pub async fn clear(&self, key: &SessionKey) -> CommentaryResult<()> {
        self.backend.delete(key.as_str()).await
    }
}
