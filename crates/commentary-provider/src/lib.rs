//! Generation-service access.
//!
//! [`CommentaryRequester`] owns the fixed persona and sampling parameters and
//! talks to any [`GenerationPort`]. Two ports are provided: an HTTP client for
//! Messages-style endpoints and a scripted provider for offline runs.
//!
//! [`GenerationPort`]: commentary_protocol::GenerationPort

mod http;
mod requester;
mod scripted;

pub use http::{DEFAULT_ANTHROPIC_VERSION, HttpMessagesProvider, ProviderConfig};
pub use requester::CommentaryRequester;
pub use scripted::ScriptedProvider;
