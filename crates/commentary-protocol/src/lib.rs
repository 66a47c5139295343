//! # commentary-protocol: shared contract for the match commentary pipeline
//!
//! This crate defines the types and trait interfaces that every other crate in
//! the workspace depends on. It carries no runtime dependencies (no tokio, no
//! HTTP client) so it can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SessionKey, RecordId, InvocationId)
//! - [`event`]: EventDescriptor and the type-keyed ExtraDetails
//! - [`message`]: Message, Role, ContentBlock (conversation history entries)
//! - [`state`]: ConversationState, HistoryWindow, DisplayView
//! - [`generation`]: GenerationParameters, GenerationRequest, GenerationResponse
//! - [`ports`]: Boundary ports (key-value store, generation service)
//! - [`error`]: CommentaryError, CommentaryResult

pub mod error;
pub mod event;
pub mod generation;
pub mod ids;
pub mod message;
pub mod ports;
pub mod state;

pub use error::{CommentaryError, CommentaryResult};
pub use event::{EventDescriptor, ExtraDetails};
pub use generation::{GenerationParameters, GenerationRequest, GenerationResponse};
pub use ids::{InvocationId, RecordId, SessionKey};
pub use message::{ContentBlock, Message, Role};
pub use ports::{GenerationPort, KeyValueStorePort};
pub use state::{ConversationState, DisplayView, HistoryWindow, NO_DATA_SENTINEL};
