use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use commentary_events::KinesisBatch;
use commentary_kernel::{CommentaryKernel, KernelBuilder, ProviderBackend, StoreBackend};
use commentary_protocol::{DisplayView, GenerationParameters, HistoryWindow, SessionKey};
use commentary_provider::{DEFAULT_ANTHROPIC_VERSION, ProviderConfig};
use commentary_runtime::InvocationResult;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod page;

use crate::page::display_page_html;

#[derive(Debug, Parser)]
#[command(name = "commentary-api")]
#[command(about = "Live match commentary ingest and display API")]
struct Cli {
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8787")]
    listen: SocketAddr,
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
    /// Base URL the display page polls; empty means the page's own origin.
    #[arg(long, env = "API_URL", default_value = "")]
    api_url: String,
    #[arg(long)]
    offline: bool,
}

#[derive(Clone)]
struct AppState {
    kernel: CommentaryKernel,
    api_url: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let kernel = build_kernel(&cli)?;
    let state = AppState {
        kernel,
        api_url: cli.api_url.clone(),
    };

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, session_key = %cli.session_key, "commentary-api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_kernel(cli: &Cli) -> Result<CommentaryKernel> {
    let provider = if cli.offline {
        ProviderBackend::Scripted(Vec::new())
    } else {
        let Some(endpoint) = cli.endpoint.clone() else {
            anyhow::bail!("--endpoint is required unless --offline is set");
        };
        ProviderBackend::Http(ProviderConfig {
            endpoint,
            api_key: cli.api_key.clone(),
            anthropic_version: cli.anthropic_version.clone(),
            timeout: cli.timeout_secs.map(Duration::from_secs),
        })
    };

    let store = match &cli.table_dir {
        Some(root) => StoreBackend::File { root: root.clone() },
        None => {
            warn!("no table directory configured; commentary is kept in memory only");
            StoreBackend::Memory
        }
    };

    let mut parameters = GenerationParameters::default();
    if let Some(model) = &cli.model {
        parameters.model = model.clone();
    }

    KernelBuilder::new(provider)
        .store(store)
        .session_key(SessionKey::from_string(cli.session_key.clone()))
        .history_window(
            cli.max_history_messages
                .map_or_else(HistoryWindow::unbounded, HistoryWindow::bounded),
        )
        .parameters(parameters)
        .build()
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(display_page))
        .route("/display", get(display))
        .route("/ingest", post(ingest))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "commentary-api"
    }))
}

async fn display_page(State(state): State<AppState>) -> Html<String> {
    Html(display_page_html(&state.api_url))
}

/// Latest commentary. Read failures degrade to the no-data view.
async fn display(State(state): State<AppState>) -> Json<DisplayView> {
    match state.kernel.latest_view().await {
        Ok(view) => Json(view),
        Err(error) => {
            warn!(%error, "failed reading latest commentary");
            Json(DisplayView::no_data())
        }
    }
}

async fn ingest(
    State(state): State<AppState>,
    Json(batch): Json<KinesisBatch>,
) -> ApiResult<Json<InvocationResult>> {
    let summary = state.kernel.process_batch(batch).await.map_err(|error| {
        error!(%error, "batch invocation failed");
        ApiError::internal(error)
    })?;
    Ok(Json(InvocationResult::from(&summary)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
