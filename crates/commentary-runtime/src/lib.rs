use std::fmt;

use chrono::Utc;
use commentary_events::{KinesisBatch, RawEventRecord, normalize_event, parse_event};
use commentary_prompt::compose;
use commentary_protocol::{
    CommentaryResult, ConversationState, DisplayView, HistoryWindow, InvocationId, Message,
    RecordId, SessionKey,
};
use commentary_provider::CommentaryRequester;
use commentary_store::ConversationStore;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub session_key: SessionKey,
    pub history_window: HistoryWindow,
    /// How many processed record ids are remembered for deduplication.
    pub dedup_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_key: SessionKey::latest(),
            history_window: HistoryWindow::unbounded(),
            dedup_capacity: 512,
        }
    }
}

/// Lifecycle of one record inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    Received,
    Decoded,
    Normalized,
    PromptComposed,
    HistoryLoaded,
    GenerationRequested,
    HistoryUpdated,
    Persisted,
}

impl fmt::Display for RecordStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Normalized => "normalized",
            Self::PromptComposed => "prompt_composed",
            Self::HistoryLoaded => "history_loaded",
            Self::GenerationRequested => "generation_requested",
            Self::HistoryUpdated => "history_updated",
            Self::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Terminal state of a record that did not abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Persisted {
        record_id: Option<RecordId>,
        commentary: String,
    },
    /// Commentary was generated but the new state could not be stored.
    PersistFailed {
        record_id: Option<RecordId>,
        commentary: String,
        error: String,
    },
    Skipped {
        record_id: Option<RecordId>,
        stage: RecordStage,
        reason: String,
    },
    Duplicate {
        record_id: RecordId,
    },
}

impl RecordOutcome {
    /// Whether a generation request was issued for this record.
    pub fn generated(&self) -> bool {
        matches!(self, Self::Persisted { .. } | Self::PersistFailed { .. })
    }

    pub fn commentary(&self) -> Option<&str> {
        match self {
            Self::Persisted { commentary, .. } | Self::PersistFailed { commentary, .. } => {
                Some(commentary)
            }
            Self::Skipped { .. } | Self::Duplicate { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub invocation_id: InvocationId,
    pub received: usize,
    /// Records for which a generation request was issued.
    pub processed_count: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub persistence_failures: usize,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchSummary {
    fn new(invocation_id: InvocationId, received: usize) -> Self {
        Self {
            invocation_id,
            received,
            processed_count: 0,
            skipped: 0,
            duplicates: 0,
            persistence_failures: 0,
            outcomes: Vec::with_capacity(received),
        }
    }

    fn record(&mut self, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::Persisted { .. } => self.processed_count += 1,
            RecordOutcome::PersistFailed { .. } => {
                self.processed_count += 1;
                self.persistence_failures += 1;
            }
            RecordOutcome::Skipped { .. } => self.skipped += 1,
            RecordOutcome::Duplicate { .. } => self.duplicates += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Result reported back to the stream transport for a successful batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl From<&BatchSummary> for InvocationResult {
    fn from(summary: &BatchSummary) -> Self {
        Self {
            status_code: 200,
            body: format!("Successfully processed {} events", summary.processed_count),
        }
    }
}

/// Drives every record of a batch through decode, prompt, generation and persistence.
///
/// Records are processed strictly in order: each prompt is sent together with
/// the history written by the previous record.
#[derive(Clone)]
pub struct CommentaryRuntime {
    config: RuntimeConfig,
    store: ConversationStore,
    requester: CommentaryRequester,
}

impl CommentaryRuntime {
    pub fn new(
        config: RuntimeConfig,
        store: ConversationStore,
        requester: CommentaryRequester,
    ) -> Self {
        Self {
            config,
            store,
            requester,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub async fn process_batch(&self, batch: KinesisBatch) -> CommentaryResult<BatchSummary> {
        self.process(&batch.into_records()).await
    }

    /// Process every record in order.
    ///
    /// Malformed records are skipped. A generation failure, or a failure to
    /// read the stored conversation, aborts the rest of the batch and is
    /// returned so the transport redelivers it.
    #[instrument(
        skip(self, batch),
        fields(
            invocation_id = tracing::field::Empty,
            batch_size = batch.len(),
            session_key = %self.config.session_key
        )
    )]
    pub async fn process(&self, batch: &[RawEventRecord]) -> CommentaryResult<BatchSummary> {
        let invocation_id = InvocationId::new_uuid();
        tracing::Span::current().record("invocation_id", tracing::field::display(&invocation_id));
        let mut summary = BatchSummary::new(invocation_id, batch.len());

        for (index, record) in batch.iter().enumerate() {
            match self.process_record(record).await {
                Ok(outcome) => summary.record(outcome),
                Err(error) => {
                    error!(
                        record_index = index,
                        remaining = batch.len() - index - 1,
                        %error,
                        "record failed; aborting batch"
                    );
                    return Err(error);
                }
            }
        }

        info!(
            processed = summary.processed_count,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            persistence_failures = summary.persistence_failures,
            "batch processed"
        );
        Ok(summary)
    }

    #[instrument(skip(self, record), fields(record_id = tracing::field::Empty))]
    async fn process_record(&self, record: &RawEventRecord) -> CommentaryResult<RecordOutcome> {
        let record_id = record.record_id();
        if let Some(record_id) = &record_id {
            tracing::Span::current().record("record_id", tracing::field::display(record_id));
        }

        let decoded = record
            .decode_bytes()
            .map_err(|error| (RecordStage::Received, error))
            .and_then(|bytes| {
                debug!(stage = %RecordStage::Decoded, bytes = bytes.len(), "record decoded");
                parse_event(bytes).map_err(|error| (RecordStage::Decoded, error))
            });
        let event = match decoded {
            Ok(event) => event,
            Err((stage, error)) if error.is_record_local() => {
                warn!(%stage, %error, "skipping malformed record");
                return Ok(RecordOutcome::Skipped {
                    record_id,
                    stage,
                    reason: error.to_string(),
                });
            }
            Err((_, error)) => return Err(error),
        };
        let descriptor = normalize_event(&event);
        debug!(stage = %RecordStage::Normalized, event_type = %descriptor.event_type, "event normalized");
        let prompt = compose(&descriptor);
        debug!(stage = %RecordStage::PromptComposed, "prompt composed");

        let key = &self.config.session_key;
        let stored = self.store.load_state(key).await?;
        if let (Some(state), Some(record_id)) = (&stored, &record_id) {
            if state.has_processed(record_id) {
                warn!("record already contributed to history; skipping duplicate");
                return Ok(RecordOutcome::Duplicate {
                    record_id: record_id.clone(),
                });
            }
        }
        let (mut history, processed_records) = match stored {
            Some(state) => (state.comment, state.processed_records),
            None => (Vec::new(), Vec::new()),
        };
        debug!(stage = %RecordStage::HistoryLoaded, history_len = history.len(), "history loaded");

        history.push(prompt);
        let commentary = self.requester.generate(&history).await?;
        info!(
            stage = %RecordStage::GenerationRequested,
            minute = descriptor.minute,
            commentary = %commentary,
            "commentary generated"
        );

        history.push(Message::assistant_text(commentary.clone()));
        self.config.history_window.apply(&mut history);
        let mut state = ConversationState {
            id: key.clone(),
            comment: history,
            timestamp: Utc::now(),
            processed_records,
        };
        if let Some(record_id) = &record_id {
            state.remember_record(record_id.clone(), self.config.dedup_capacity);
        }
        debug!(stage = %RecordStage::HistoryUpdated, history_len = state.comment.len(), "history updated");

        match self.store.save_state(&state).await {
            Ok(()) => {
                debug!(stage = %RecordStage::Persisted, "conversation persisted");
                Ok(RecordOutcome::Persisted {
                    record_id,
                    commentary,
                })
            }
            Err(error) => {
                warn!(%error, "failed to persist conversation; keeping generated commentary");
                Ok(RecordOutcome::PersistFailed {
                    record_id,
                    commentary,
                    error: error.to_string(),
                })
            }
        }
    }

    /// Current read-side view of the configured session.
    pub async fn latest_view(&self) -> CommentaryResult<DisplayView> {
        let state = self.store.load_state(&self.config.session_key).await?;
        Ok(DisplayView::from_state(state.as_ref()))
    }

    pub async fn history(&self) -> CommentaryResult<Vec<Message>> {
        self.store.load(&self.config.session_key).await
    }
}
