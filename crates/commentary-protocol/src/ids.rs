//! Typed ID wrappers.
//!
//! IDs are opaque String wrappers (serde-transparent). The pipeline never
//! interprets them beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Key under which a conversation state is stored. Default is "latest".
    SessionKey
);
typed_id!(
    /// Deduplication identifier of one stream record.
    RecordId
);
typed_id!(
    /// Identifier for one batch invocation, used to correlate log lines.
    InvocationId
);

impl SessionKey {
    pub const LATEST: &'static str = "latest";

    pub fn latest() -> Self {
        Self::from_string(Self::LATEST)
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::latest()
    }
}

impl InvocationId {
    /// Create a new ID using UUID v4 (random).
    pub fn new_uuid() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new_uuid()
    }
}
