use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use commentary_events::KinesisBatch;
use commentary_kernel::{KernelBuilder, ProviderBackend, StoreBackend};
use commentary_protocol::{GenerationParameters, HistoryWindow, SessionKey};
use commentary_provider::{DEFAULT_ANTHROPIC_VERSION, ProviderConfig};
use commentary_runtime::InvocationResult;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "commentaryd")]
#[command(about = "Turn one batch of match events into live commentary")]
struct Cli {
    /// Batch file in stream envelope shape, or `-` for stdin.
    #[arg(long, default_value = "-")]
    batch: String,
    /// Directory holding the conversation table. In-memory when omitted.
    #[arg(long, env = "TABLE_DIR")]
    table_dir: Option<PathBuf>,
    #[arg(long, env = "SESSION_KEY", default_value = SessionKey::LATEST)]
    session_key: String,
    #[arg(long, env = "GENERATION_ENDPOINT", required_unless_present = "offline")]
    endpoint: Option<String>,
    #[arg(long, env = "GENERATION_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "ANTHROPIC_VERSION", default_value = DEFAULT_ANTHROPIC_VERSION)]
    anthropic_version: String,
    #[arg(long, env = "GENERATION_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    #[arg(long, env = "MODEL_ID")]
    model: Option<String>,
    #[arg(long, env = "MAX_HISTORY_MESSAGES")]
    max_history_messages: Option<usize>,
    /// Answer with numbered placeholder commentary instead of calling a service.
    #[arg(long)]
    offline: bool,
}

impl Cli {
    fn provider_backend(&self) -> Result<ProviderBackend> {
        if self.offline {
            return Ok(ProviderBackend::Scripted(Vec::new()));
        }
        let endpoint = self
            .endpoint
            .clone()
            .context("--endpoint is required unless --offline is set")?;
        Ok(ProviderBackend::Http(ProviderConfig {
            endpoint,
            api_key: self.api_key.clone(),
            anthropic_version: self.anthropic_version.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }))
    }

    fn store_backend(&self) -> StoreBackend {
        match &self.table_dir {
            Some(root) => StoreBackend::File { root: root.clone() },
            None => StoreBackend::Memory,
        }
    }

    fn parameters(&self) -> GenerationParameters {
        let mut parameters = GenerationParameters::default();
        if let Some(model) = &self.model {
            parameters.model = model.clone();
        }
        parameters
    }

    fn history_window(&self) -> HistoryWindow {
        self.max_history_messages
            .map_or_else(HistoryWindow::unbounded, HistoryWindow::bounded)
    }
}

async fn read_batch(source: &str) -> Result<KinesisBatch> {
    let raw = if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed reading batch from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("failed reading batch file {source}"))?
    };
    serde_json::from_str(&raw).context("batch is not a valid stream envelope")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let kernel = KernelBuilder::new(cli.provider_backend()?)
        .store(cli.store_backend())
        .session_key(SessionKey::from_string(cli.session_key.clone()))
        .history_window(cli.history_window())
        .parameters(cli.parameters())
        .build()?;

    let batch = read_batch(&cli.batch).await?;
    info!(records = batch.records.len(), source = %cli.batch, "batch loaded");

    let summary = match kernel.process_batch(batch).await {
        Ok(summary) => summary,
        Err(error) => {
            error!(%error, "batch invocation failed");
            return Err(error.into());
        }
    };

    for outcome in &summary.outcomes {
        if let Some(commentary) = outcome.commentary() {
            info!(commentary = %commentary, "generated commentary");
        }
    }

    let result = InvocationResult::from(&summary);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_mode_needs_no_endpoint() {
        let cli = Cli::try_parse_from(["commentaryd", "--offline", "--batch", "batch.json"])
            .expect("offline flags parse");
        assert!(matches!(
            cli.provider_backend(),
            Ok(ProviderBackend::Scripted(_))
        ));
        assert!(matches!(cli.store_backend(), StoreBackend::Memory));
        assert_eq!(cli.session_key, "latest");
    }

    #[test]
    fn http_mode_maps_flags_to_provider_config() {
        let cli = Cli::try_parse_from([
            "commentaryd",
            "--endpoint",
            "http://127.0.0.1:9000/v1/messages",
            "--timeout-secs",
            "30",
            "--model",
            "local-model",
            "--max-history-messages",
            "20",
        ])
        .expect("http flags parse");

        let Ok(ProviderBackend::Http(config)) = cli.provider_backend() else {
            panic!("expected an http provider");
        };
        assert_eq!(config.endpoint, "http://127.0.0.1:9000/v1/messages");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cli.parameters().model, "local-model");
        assert_eq!(cli.history_window(), HistoryWindow::bounded(20));
    }

    #[tokio::test]
    async fn sample_batch_runs_offline() -> Result<()> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/sample_batch.json");
        let batch = read_batch(path).await?;
        assert_eq!(batch.records.len(), 3);

        let kernel = KernelBuilder::new(ProviderBackend::Scripted(Vec::new())).build()?;
        let summary = kernel.process_batch(batch).await?;
        assert_eq!(
            InvocationResult::from(&summary).body,
            "Successfully processed 3 events"
        );
        assert_eq!(kernel.history().await?.len(), 6);
        Ok(())
    }
}
