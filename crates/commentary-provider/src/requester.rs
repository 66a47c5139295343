use std::sync::Arc;

use commentary_prompt::COMMENTATOR_PERSONA;
use commentary_protocol::{
    CommentaryError, CommentaryResult, GenerationParameters, GenerationPort, GenerationRequest,
    Message,
};
use tracing::instrument;

/// Sends a conversation history to the generation service and returns the reply text.
#[derive(Clone)]
pub struct CommentaryRequester {
    provider: Arc<dyn GenerationPort>,
    system_instruction: String,
    parameters: GenerationParameters,
}

impl CommentaryRequester {
    /// A requester using the commentator persona and default parameters.
    pub fn new(provider: Arc<dyn GenerationPort>) -> Self {
        Self {
            provider,
            system_instruction: COMMENTATOR_PERSONA.to_owned(),
            parameters: GenerationParameters::default(),
        }
    }

    pub fn with_system_instruction(mut self, system_instruction: impl Into<String>) -> Self {
        self.system_instruction = system_instruction.into();
        self
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }

    #[instrument(skip(self, history), fields(history_len = history.len(), model = %self.parameters.model))]
    pub async fn generate(&self, history: &[Message]) -> CommentaryResult<String> {
        let response = self
            .provider
            .generate(GenerationRequest {
                messages: history.to_vec(),
                system_instruction: self.system_instruction.clone(),
                parameters: self.parameters.clone(),
            })
            .await?;
        let text = response.message.text_content();
        if text.trim().is_empty() {
            return Err(CommentaryError::GenerationService(
                "generation reply was empty".to_owned(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedProvider;

    #[tokio::test]
    async fn generate_sends_history_persona_and_parameters() {
        let provider = Arc::new(ScriptedProvider::new(["What a header!"]));
        let requester = CommentaryRequester::new(provider.clone());
        let history = vec![Message::user_text("Minute: 34\n\nCommentary:")];

        let text = requester.generate(&history).await.unwrap();
        assert_eq!(text, "What a header!");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, history);
        assert_eq!(requests[0].system_instruction, COMMENTATOR_PERSONA);
        assert_eq!(requests[0].parameters, GenerationParameters::default());
    }

    #[tokio::test]
    async fn overrides_are_forwarded() {
        let provider = Arc::new(ScriptedProvider::default());
        let requester = CommentaryRequester::new(provider.clone())
            .with_system_instruction("Be calm.")
            .with_parameters(GenerationParameters {
                temperature: 0.2,
                ..GenerationParameters::default()
            });

        requester.generate(&[Message::user_text("p")]).await.unwrap();
        let request = &provider.requests()[0];
        assert_eq!(request.system_instruction, "Be calm.");
        assert_eq!(request.parameters.temperature, 0.2);
    }

    #[tokio::test]
    async fn empty_reply_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new(["   "]));
        let requester = CommentaryRequester::new(provider);
        let error = requester.generate(&[Message::user_text("p")]).await.unwrap_err();
        assert!(matches!(error, CommentaryError::GenerationService(_)));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::default().failing_on(1));
        let requester = CommentaryRequester::new(provider);
        let error = requester.generate(&[Message::user_text("p")]).await.unwrap_err();
        assert!(error.to_string().contains("scripted failure on call 1"));
    }
}
