//! Turns normalized match events into user prompts for the commentary model.
//!
//! Composition is a pure function of the descriptor: no clock, no randomness,
//! so identical events always produce byte-identical prompts.

use commentary_protocol::{EventDescriptor, ExtraDetails, Message};

/// System instruction sent with every generation request.
pub const COMMENTATOR_PERSONA: &str = "You are an enthusiastic soccer commentator. \
You receive formatted event data coming from a news source, one event per message. \
Generate a single sentence of commentary that captures the excitement and significance of \
this moment in the match. Be creative and use varied language to keep the commentary \
engaging, and feel free to use emphasis and emoji. If it's a goal, make it extra exciting!";

const PROMPT_PREAMBLE: &str =
    "This is formatted event data coming from a news source. Here is the event:";

const COMMENTARY_CUE: &str = "Commentary:";

/// Compose the user prompt for one event.
pub fn compose(descriptor: &EventDescriptor) -> Message {
    Message::user_text(compose_text(descriptor))
}

pub fn compose_text(descriptor: &EventDescriptor) -> String {
    let mut prompt = String::new();
    prompt.push_str(PROMPT_PREAMBLE);
    prompt.push_str("\n\n");

    push_field(&mut prompt, "Event Type", &descriptor.event_type);
    push_field(&mut prompt, "Minute", descriptor.minute);
    push_field(&mut prompt, "Team", &descriptor.team);
    push_field(&mut prompt, "Player", &descriptor.player);
    push_field(&mut prompt, "Opponent", &descriptor.opponent);
    push_field(&mut prompt, "Location", &descriptor.location);
    push_field(
        &mut prompt,
        "Was a Goal scored in this event",
        if descriptor.is_goal { "Yes" } else { "No" },
    );
    if let Some(details) = &descriptor.extra_details {
        prompt.push_str(&format_extra_details(details));
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(COMMENTARY_CUE);
    prompt
}

/// One line of type-specific details.
pub fn format_extra_details(details: &ExtraDetails) -> String {
    match details {
        ExtraDetails::Attempt {
            shot_outcome,
            shot_place,
            bodypart,
            distance_to_goal,
        } => format!(
            "Shot outcome: {shot_outcome}, Shot place: {shot_place}, \
             Body part: {bodypart}, Distance to Goal: {distance_to_goal}"
        ),
        ExtraDetails::Card { card_type } => format!("Card type: {card_type}"),
        ExtraDetails::Substitution {
            player_in,
            player_out,
        } => format!("Player in: {player_in}, Player out: {player_out}"),
    }
}

fn push_field(prompt: &mut String, label: &str, value: impl std::fmt::Display) {
    prompt.push_str(&format!("{label}: {value}\n"));
}
