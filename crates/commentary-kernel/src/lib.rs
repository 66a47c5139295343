use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use commentary_events::{KinesisBatch, RawEventRecord};
use commentary_protocol::{
    CommentaryResult, DisplayView, GenerationParameters, GenerationPort, HistoryWindow,
    KeyValueStorePort, Message, SessionKey,
};
use commentary_provider::{
    CommentaryRequester, HttpMessagesProvider, ProviderConfig, ScriptedProvider,
};
use commentary_runtime::{BatchSummary, CommentaryRuntime, RuntimeConfig};
use commentary_store::{ConversationStore, FileKeyValueStore, InMemoryKeyValueStore};
use tracing::{info, instrument};

/// Where conversation state is kept.
#[derive(Debug, Clone, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    File {
        root: PathBuf,
    },
}

/// Which generation service answers prompts.
#[derive(Debug, Clone)]
pub enum ProviderBackend {
    Http(ProviderConfig),
    /// Offline replies, served in order and then numbered.
    Scripted(Vec<String>),
}

#[derive(Clone)]
pub struct KernelBuilder {
    runtime: RuntimeConfig,
    store: StoreBackend,
    provider: ProviderBackend,
    parameters: GenerationParameters,
    system_instruction: Option<String>,
    store_handle: Option<Arc<dyn KeyValueStorePort>>,
    provider_handle: Option<Arc<dyn GenerationPort>>,
}

impl KernelBuilder {
    pub fn new(provider: ProviderBackend) -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            store: StoreBackend::default(),
            provider,
            parameters: GenerationParameters::default(),
            system_instruction: None,
            store_handle: None,
            provider_handle: None,
        }
    }

    pub fn store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    pub fn session_key(mut self, session_key: SessionKey) -> Self {
        self.runtime.session_key = session_key;
        self
    }

    pub fn history_window(mut self, history_window: HistoryWindow) -> Self {
        self.runtime.history_window = history_window;
        self
    }

    pub fn dedup_capacity(mut self, dedup_capacity: usize) -> Self {
        self.runtime.dedup_capacity = dedup_capacity;
        self
    }

    pub fn parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn system_instruction(mut self, system_instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(system_instruction.into());
        self
    }

    /// Use an already constructed table instead of [`StoreBackend`].
    pub fn store_handle(mut self, store: Arc<dyn KeyValueStorePort>) -> Self {
        self.store_handle = Some(store);
        self
    }

    /// Use an already constructed provider instead of [`ProviderBackend`].
    pub fn provider_handle(mut self, provider: Arc<dyn GenerationPort>) -> Self {
        self.provider_handle = Some(provider);
        self
    }

    pub fn build(self) -> Result<CommentaryKernel> {
        let table: Arc<dyn KeyValueStorePort> = match self.store_handle {
            Some(table) => table,
            None => match &self.store {
                StoreBackend::Memory => Arc::new(InMemoryKeyValueStore::new()),
                StoreBackend::File { root } => Arc::new(FileKeyValueStore::new(root)),
            },
        };

        let provider: Arc<dyn GenerationPort> = match self.provider_handle {
            Some(provider) => provider,
            None => match self.provider {
                ProviderBackend::Http(config) => Arc::new(HttpMessagesProvider::new(config)?),
                ProviderBackend::Scripted(replies) => Arc::new(ScriptedProvider::new(replies)),
            },
        };

        let mut requester = CommentaryRequester::new(provider).with_parameters(self.parameters);
        if let Some(system_instruction) = self.system_instruction {
            requester = requester.with_system_instruction(system_instruction);
        }

        info!(
            session_key = %self.runtime.session_key,
            store = ?self.store,
            max_history_messages = ?self.runtime.history_window.max_messages,
            "commentary kernel built"
        );
        let runtime = CommentaryRuntime::new(
            self.runtime,
            ConversationStore::new(table),
            requester,
        );
        Ok(CommentaryKernel { runtime })
    }
}

#[derive(Clone)]
pub struct CommentaryKernel {
    runtime: CommentaryRuntime,
}

impl CommentaryKernel {
    pub fn session_key(&self) -> &SessionKey {
        &self.runtime.config().session_key
    }

    #[instrument(skip(self, batch), fields(records = batch.records.len()))]
    pub async fn process_batch(&self, batch: KinesisBatch) -> CommentaryResult<BatchSummary> {
        self.runtime.process_batch(batch).await
    }

    pub async fn process(&self, records: &[RawEventRecord]) -> CommentaryResult<BatchSummary> {
        self.runtime.process(records).await
    }

    pub async fn latest_view(&self) -> CommentaryResult<DisplayView> {
        self.runtime.latest_view().await
    }

    pub async fn history(&self) -> CommentaryResult<Vec<Message>> {
        self.runtime.history().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use anyhow::Result;
    use commentary_protocol::NO_DATA_SENTINEL;
    use commentary_runtime::InvocationResult;

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    fn batch(payloads: &[&str]) -> KinesisBatch {
        KinesisBatch::from_payloads(payloads.iter().map(|payload| payload.as_bytes()))
    }

    #[tokio::test]
    async fn file_backed_history_survives_restart() -> Result<()> {
        let root = unique_test_root("commentary-kernel-restart");
        let build = || {
            KernelBuilder::new(ProviderBackend::Scripted(vec!["What a save!".into()]))
                .store(StoreBackend::File { root: root.clone() })
                .build()
        };

        let kernel = build()?;
        assert_eq!(kernel.latest_view().await?.comment, NO_DATA_SENTINEL);
        let summary = kernel
            .process_batch(batch(&[r#"{"event_type":"Save","minute":12}"#]))
            .await?;
        assert_eq!(
            InvocationResult::from(&summary).body,
            "Successfully processed 1 events"
        );

        let restarted = build()?;
        assert_eq!(restarted.history().await?.len(), 2);
        assert_eq!(restarted.latest_view().await?.comment, "What a save!");

        let _ = tokio::fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn injected_handles_take_precedence() -> Result<()> {
        let table = Arc::new(InMemoryKeyValueStore::new());
        let provider = Arc::new(ScriptedProvider::new(["injected"]));
        let kernel = KernelBuilder::new(ProviderBackend::Scripted(vec!["configured".into()]))
            .store(StoreBackend::File {
                root: unique_test_root("commentary-kernel-unused"),
            })
            .store_handle(table.clone())
            .provider_handle(provider.clone())
            .session_key(SessionKey::from("semi-final"))
            .system_instruction("Commentate in haiku.")
            .build()?;

        kernel
            .process_batch(batch(&[r#"{"event_type":"Foul"}"#]))
            .await?;
        assert_eq!(kernel.latest_view().await?.comment, "injected");
        assert_eq!(kernel.session_key().as_str(), "semi-final");
        assert_eq!(table.len(), 1);
        assert_eq!(
            provider.requests()[0].system_instruction,
            "Commentate in haiku."
        );
        Ok(())
    }

    #[tokio::test]
    async fn history_window_is_forwarded() -> Result<()> {
        let kernel = KernelBuilder::new(ProviderBackend::Scripted(Vec::new()))
            .history_window(HistoryWindow::bounded(2))
            .dedup_capacity(8)
            .build()?;
        kernel
            .process_batch(batch(&[
                r#"{"event_type":"Corner","minute":1}"#,
                r#"{"event_type":"Corner","minute":2}"#,
            ]))
            .await?;
        let history = kernel.history().await?;
        assert_eq!(history.len(), 2);
        assert!(history[0].text_content().contains("Minute: 2"));
        Ok(())
    }
}
