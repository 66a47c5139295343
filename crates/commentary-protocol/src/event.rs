//! Normalized match event descriptors.

use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_TYPE: &str = "Unknown";
pub const DEFAULT_TEAM: &str = "Unknown team";
pub const DEFAULT_PLAYER: &str = "Unknown player";
pub const DEFAULT_OPPONENT: &str = "Unknown opponent";

/// One match event with every field populated.
///
/// Absent input fields are replaced by the `DEFAULT_*` placeholders, an empty
/// location, minute 0 and `is_goal = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub event_type: String,
    pub minute: i64,
    pub team: String,
    pub player: String,
    pub opponent: String,
    pub location: String,
    pub is_goal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_details: Option<ExtraDetails>,
}

impl Default for EventDescriptor {
    fn default() -> Self {
        Self {
            event_type: DEFAULT_EVENT_TYPE.to_owned(),
            minute: 0,
            team: DEFAULT_TEAM.to_owned(),
            player: DEFAULT_PLAYER.to_owned(),
            opponent: DEFAULT_OPPONENT.to_owned(),
            location: String::new(),
            is_goal: false,
            extra_details: None,
        }
    }
}

/// Event-type-specific details carried alongside the common fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtraDetails {
    /// "Attempt" events.
    Attempt {
        shot_outcome: String,
        shot_place: String,
        bodypart: String,
        distance_to_goal: String,
    },
    /// "Yellow card" and "Red card" events.
    Card { card_type: String },
    /// "Substitution" events.
    Substitution {
        player_in: String,
        player_out: String,
    },
}
