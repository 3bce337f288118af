//! Persisted index document
//!
//! The whole session index is one pretty-printed JSON document:
//! session metadata, the transcript cursor, and the ordered exchanges.
//! Timestamps are RFC 3339.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One user prompt paired with the assistant's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// 1-based, contiguous, chronological
    pub idx: u32,
    pub timestamp: DateTime<FixedOffset>,
    pub preview: String,
    pub user_text: String,
    pub assistant_text: String,
}

/// A user turn whose reply has not reached the transcript yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTurn {
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// Snapshot of the current session's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIndex {
    pub session_id: String,
    pub session_start: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub total_exchanges: u32,
    pub transcript_path: String,
    /// Transcript position already consumed
    #[serde(alias = "_byte_offset")]
    pub byte_offset: u64,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_user: Option<PendingTurn>,
}

impl SessionIndex {
    /// Empty index for a session that starts now
    pub fn new(session_id: &str, transcript_path: &str, now: DateTime<Utc>) -> Self {
        let now = now.fixed_offset();
        Self {
            session_id: session_id.to_string(),
            session_start: now,
            updated_at: now,
            total_exchanges: 0,
            transcript_path: transcript_path.to_string(),
            byte_offset: 0,
            exchanges: vec![],
            pending_user: None,
        }
    }

    /// Next idx to hand out
    pub fn next_idx(&self) -> u32 {
        self.exchanges.len() as u32 + 1
    }

    pub fn last_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.exchanges.last().map(|e| e.timestamp)
    }

    /// Check the structural invariants a loaded document must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_exchanges as usize != self.exchanges.len() {
            return Err(format!(
                "total_exchanges is {} but {} exchanges are stored",
                self.total_exchanges,
                self.exchanges.len()
            ));
        }

        for (position, exchange) in self.exchanges.iter().enumerate() {
            let expected = position as u32 + 1;
            if exchange.idx != expected {
                return Err(format!(
                    "exchange at position {} has idx {} (expected {})",
                    position, exchange.idx, expected
                ));
            }
        }

        Ok(())
    }
}
