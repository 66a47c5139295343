use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use commentary_protocol::{
    CommentaryError, CommentaryResult, GenerationPort, GenerationRequest, GenerationResponse,
    Message,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub const DEFAULT_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full URL the request body is POSTed to.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub anthropic_version: String,
    /// `None` waits for the service indefinitely.
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_owned(),
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequestBody<'a> {
    anthropic_version: &'a str,
    model: &'a str,
    system: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponseBody {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for endpoints speaking the Messages request/response shape.
#[derive(Debug, Clone)]
pub struct HttpMessagesProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpMessagesProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("failed building generation http client")?;
        Ok(Self { client, config })
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String> {
        let body = MessagesRequestBody {
            anthropic_version: &self.config.anthropic_version,
            model: &request.parameters.model,
            system: &request.system_instruction,
            messages: &request.messages,
            max_tokens: request.parameters.max_tokens,
            temperature: request.parameters.temperature,
            top_p: request.parameters.top_p,
            top_k: request.parameters.top_k,
        };

        let mut http_request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            http_request = http_request.header("x-api-key", api_key);
        }

        let response = http_request
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.config.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("service returned {status}: {detail}");
        }

        let parsed: MessagesResponseBody = response
            .json()
            .await
            .context("failed decoding service response")?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            anyhow::bail!("service reply contained no text");
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerationPort for HttpMessagesProvider {
    #[instrument(
        skip(self, request),
        fields(endpoint = %self.config.endpoint, history_len = request.messages.len())
    )]
    async fn generate(&self, request: GenerationRequest) -> CommentaryResult<GenerationResponse> {
        match self.send(&request).await {
            Ok(text) => {
                debug!(reply_len = text.len(), "generation reply received");
                Ok(GenerationResponse {
                    message: Message::assistant_text(text),
                })
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "generation request failed");
                Err(CommentaryError::GenerationService(format!("{error:#}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use commentary_protocol::GenerationParameters;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn spawn_server(router: Router) -> Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(format!("http://{addr}/v1/messages"))
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![Message::user_text("Minute: 34\n\nCommentary:")],
            system_instruction: "You are an enthusiastic soccer commentator.".into(),
            parameters: GenerationParameters::default(),
        }
    }

    #[tokio::test]
    async fn sends_messages_shape_and_extracts_text() -> Result<()> {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v1/messages",
                post(|State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().push(body);
                    Json(json!({
                        "content": [
                            { "type": "text", "text": "GOAL! " },
                            { "type": "text", "text": "Smith heads it home!" }
                        ],
                        "stop_reason": "end_turn"
                    }))
                }),
            )
            .with_state(captured.clone());
        let endpoint = spawn_server(router).await?;

        let provider = HttpMessagesProvider::new(ProviderConfig::new(endpoint))?;
        let response = provider.generate(request()).await?;
        assert_eq!(response.message.text_content(), "GOAL! Smith heads it home!");

        let bodies = captured.lock();
        let body = &bodies[0];
        assert_eq!(body["anthropic_version"], DEFAULT_ANTHROPIC_VERSION);
        assert_eq!(body["max_tokens"], 400);
        assert_eq!(body["top_k"], 250);
        assert_eq!(body["system"], "You are an enthusiastic soccer commentator.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        Ok(())
    }

    #[tokio::test]
    async fn error_status_is_a_generation_error() -> Result<()> {
        let router = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "throttled") }),
        );
        let endpoint = spawn_server(router).await?;

        let provider = HttpMessagesProvider::new(ProviderConfig::new(endpoint))?;
        let error = provider.generate(request()).await.unwrap_err();
        assert!(matches!(error, CommentaryError::GenerationService(_)));
        assert!(error.to_string().contains("503"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_reply_is_a_generation_error() -> Result<()> {
        let router = Router::new().route(
            "/v1/messages",
            post(|| async { Json(json!({ "content": [] })) }),
        );
        let endpoint = spawn_server(router).await?;

        let provider = HttpMessagesProvider::new(ProviderConfig::new(endpoint))?;
        let error = provider.generate(request()).await.unwrap_err();
        assert!(error.to_string().contains("no text"));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_generation_error() -> Result<()> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let provider =
            HttpMessagesProvider::new(ProviderConfig::new(format!("http://{addr}/v1/messages")))?;
        let error = provider.generate(request()).await.unwrap_err();
        assert!(matches!(error, CommentaryError::GenerationService(_)));
        Ok(())
    }
}
