//! Transcript reading: role-tagged JSONL records into paired exchanges
//!
//! The transcript is append-only. Each invocation reads only the bytes after
//! the stored cursor, turns complete lines into [`Turn`]s, and pairs them
//! with [`pair_turns`].

mod claudecode;
mod reader;

pub use claudecode::parse_record;
pub use reader::{read_delta, transcript_len, Delta};

use chrono::{DateTime, FixedOffset};

use crate::store::PendingTurn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A text-bearing transcript record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// A user turn matched with the assistant turn that answered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPair {
    pub user: PendingTurn,
    pub assistant: Turn,
}

/// Pair user turns with the assistant turn that directly follows them.
///
/// `pending` is a user turn left over from the previous delta. A user turn
/// followed by another user turn is dropped, and an assistant turn with no
/// user turn before it is ignored. Returns the pairs and the user turn still
/// waiting for a reply, if any.
pub fn pair_turns(
    pending: Option<PendingTurn>,
    turns: Vec<Turn>,
) -> (Vec<TurnPair>, Option<PendingTurn>) {
    let mut pairs = vec![];
    let mut pending = pending;

    for turn in turns {
        match turn.role {
            Role::User => {
                pending = Some(PendingTurn {
                    text: turn.text,
                    timestamp: turn.timestamp,
                });
            }
            Role::Assistant => {
                if let Some(user) = pending.take() {
                    pairs.push(TurnPair {
                        user,
                        assistant: turn,
                    });
                }
            }
        }
    }

    (pairs, pending)
}

/// Collapse whitespace and cut to `max_length` characters with a trailing "..."
pub fn make_preview(text: &str, max_length: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_length {
        return collapsed;
    }
    let keep = max_length.saturating_sub(3);
    let mut preview: String = collapsed.chars().take(keep).collect();
    preview.push_str("...");
    preview
}

/// Cut `text` to `max_chars` characters, marking the cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_pos, _)) => format!("{}\n\n[...truncated...]", &text[..byte_pos]),
    }
}
