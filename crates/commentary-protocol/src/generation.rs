//! Generation-service request and response types.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Fixed sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            model: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_owned(),
            temperature: 0.9,
            top_p: 0.95,
            top_k: 250,
            max_tokens: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub system_instruction: String,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub message: Message,
}
