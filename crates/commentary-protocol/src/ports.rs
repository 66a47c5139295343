//! Boundary ports for external collaborators.
//!
//! These traits are the only allowed boundary between the pipeline and the
//! storage backend or the generation service.
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.

use crate::error::CommentaryResult;
use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;

/// A single table of JSON items addressed by a string key.
#[async_trait]
pub trait KeyValueStorePort: Send + Sync {
    async fn get(&self, key: &str) -> CommentaryResult<Option<serde_json::Value>>;
    /// Insert or overwrite the item stored under `key`.
    async fn put(&self, key: &str, item: serde_json::Value) -> CommentaryResult<()>;
    /// Remove the item; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> CommentaryResult<()>;
}

#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> CommentaryResult<GenerationResponse>;
}
