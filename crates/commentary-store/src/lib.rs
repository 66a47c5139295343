//! Storage for conversation state.
//!
//! [`ConversationStore`] is the only writer of [`ConversationState`] records.
//! It sits on top of any [`KeyValueStorePort`] backend; two are provided here.
//!
//! [`ConversationState`]: commentary_protocol::ConversationState
//! [`KeyValueStorePort`]: commentary_protocol::KeyValueStorePort

mod conversation;
mod kv;

pub use conversation::ConversationStore;
pub use kv::{FileKeyValueStore, InMemoryKeyValueStore};
