use std::collections::VecDeque;

use async_trait::async_trait;
use commentary_protocol::{
    CommentaryError, CommentaryResult, GenerationPort, GenerationRequest, GenerationResponse,
    Message,
};
use parking_lot::Mutex;

/// Replays queued replies and records every request it receives.
///
/// Once the queue is empty it answers `"Commentary #<call>"`. A provider built
/// with [`ScriptedProvider::failing_on`] returns a generation error for that
/// call number (1-based).
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    fail_on_call: Option<usize>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerationPort for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> CommentaryResult<GenerationResponse> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(CommentaryError::GenerationService(format!(
                "scripted failure on call {call}"
            )));
        }
        let text = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("Commentary #{call}"));
        Ok(GenerationResponse {
            message: Message::assistant_text(text),
        })
    }
}
