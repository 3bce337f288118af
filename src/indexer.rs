//! Incremental index builder
//!
//! Brings the stored index up to date with the transcript: reuse the stored
//! index for the same session, rebuild on a new session, a rotated transcript,
//! or a corrupt index, then append whatever complete exchanges the new bytes hold.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{RecallError, Result};
use crate::store::{Exchange, IndexStore, SessionIndex};
use crate::transcript::{self, make_preview, pair_turns, truncate_text, Delta, TurnPair};
use crate::Config;

/// Why the index was built from scratch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// No index stored yet
    Missing,
    /// The stored index belongs to another session
    NewSession,
    /// The transcript shrank below the stored cursor, or moved
    Rollover,
    /// The stored index could not be read
    CorruptIndex,
}

impl RebuildReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildReason::Missing => "no index",
            RebuildReason::NewSession => "new session",
            RebuildReason::Rollover => "transcript rollover",
            RebuildReason::CorruptIndex => "corrupt index",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing new; the stored index was not rewritten
    Unchanged,
    Updated { added: usize },
    Rebuilt { reason: RebuildReason, added: usize },
}

/// Result of one indexer run: what happened and the index as it now stands
#[derive(Debug)]
pub struct UpdateReport {
    pub outcome: UpdateOutcome,
    pub index: SessionIndex,
}

/// Settings that shape stored exchanges
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub preview_length: usize,
    pub max_chars_per_message: usize,
    pub retain_previous_sessions: bool,
}

impl IndexSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            preview_length: config.display.preview_length,
            max_chars_per_message: config.display.max_chars_per_message,
            retain_previous_sessions: config.storage.retain_previous_sessions,
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Indexer<'a> {
    store: &'a IndexStore,
    settings: IndexSettings,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a IndexStore, settings: IndexSettings) -> Self {
        Self { store, settings }
    }

    /// Bring the index for `session_id` up to date with `transcript_path`.
    pub fn update(
        &self,
        session_id: &str,
        transcript_path: &Path,
        now: DateTime<Utc>,
    ) -> Result<UpdateReport> {
        let path_str = transcript_path.to_string_lossy().to_string();
        let fresh = || SessionIndex::new(session_id, &path_str, now);

        let stored = match self.store.load() {
            Ok(stored) => stored.map(Ok),
            Err(e @ RecallError::CorruptIndex { .. }) => Some(Err(e)),
            Err(e) => return Err(e),
        };

        let (mut index, mut rebuild) = match stored {
            Some(Ok(index)) if index.session_id == session_id => (index, None),
            Some(Ok(previous)) => {
                tracing::info!(
                    previous = %previous.session_id,
                    session = %session_id,
                    "New session, replacing index"
                );
                if self.settings.retain_previous_sessions {
                    let kept = self.store.archive(&previous)?;
                    tracing::info!(path = %kept.display(), "Kept previous session index");
                }
                (fresh(), Some(RebuildReason::NewSession))
            }
            Some(Err(e)) => {
                tracing::warn!("{}; rebuilding from transcript", e);
                (fresh(), Some(RebuildReason::CorruptIndex))
            }
            None => (fresh(), Some(RebuildReason::Missing)),
        };

        if rebuild.is_none() && index.transcript_path != path_str {
            tracing::info!(
                from = %index.transcript_path,
                to = %path_str,
                "Transcript path changed, rebuilding"
            );
            index = fresh();
            rebuild = Some(RebuildReason::Rollover);
        }

        let delta = match self.read_new_bytes(&index, transcript_path)? {
            ReadResult::Delta(delta) => delta,
            ReadResult::Rotated => {
                tracing::info!(
                    offset = index.byte_offset,
                    "Transcript shorter than cursor, rebuilding"
                );
                index = fresh();
                rebuild = Some(RebuildReason::Rollover);
                match self.read_new_bytes(&index, transcript_path)? {
                    ReadResult::Delta(delta) => delta,
                    // Cannot happen from offset 0; treat as empty
                    ReadResult::Rotated | ReadResult::Unavailable | ReadResult::AtEnd => {
                        Delta::default()
                    }
                }
            }
            ReadResult::Unavailable | ReadResult::AtEnd => Delta {
                end_offset: index.byte_offset,
                ..Delta::default()
            },
        };

        let previous_offset = index.byte_offset;
        let previous_pending = index.pending_user.clone();
        let added = self.apply_delta(&mut index, delta, now);

        let changed = rebuild.is_some()
            || added > 0
            || index.byte_offset != previous_offset
            || index.pending_user != previous_pending;

        if !changed {
            return Ok(UpdateReport {
                outcome: UpdateOutcome::Unchanged,
                index,
            });
        }

        if rebuild.is_some() {
            if let Some(first) = index.exchanges.first() {
                index.session_start = first.timestamp;
            }
        }
        index.updated_at = now.fixed_offset();
        self.store.save(&index)?;

        let outcome = match rebuild {
            Some(reason) => UpdateOutcome::Rebuilt { reason, added },
            None => UpdateOutcome::Updated { added },
        };
        tracing::debug!(?outcome, total = index.total_exchanges, "Index persisted");

        Ok(UpdateReport { outcome, index })
    }

    fn read_new_bytes(&self, index: &SessionIndex, transcript_path: &Path) -> Result<ReadResult> {
        let len = match transcript::transcript_len(transcript_path) {
            Ok(len) => len,
            Err(e @ RecallError::TranscriptUnavailable { .. }) => {
                tracing::debug!("{}", e);
                return Ok(ReadResult::Unavailable);
            }
            Err(e) => return Err(e),
        };

        if len < index.byte_offset {
            return Ok(ReadResult::Rotated);
        }
        if len == index.byte_offset {
            return Ok(ReadResult::AtEnd);
        }

        match transcript::read_delta(transcript_path, index.byte_offset) {
            Ok(delta) => {
                if delta.skipped > 0 {
                    tracing::debug!(skipped = delta.skipped, "Skipped malformed records");
                }
                Ok(ReadResult::Delta(delta))
            }
            Err(e @ RecallError::TranscriptUnavailable { .. }) => {
                tracing::debug!("{}", e);
                Ok(ReadResult::Unavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Append the delta's complete exchanges and advance the cursor.
    fn apply_delta(&self, index: &mut SessionIndex, delta: Delta, now: DateTime<Utc>) -> usize {
        let (pairs, pending) = pair_turns(index.pending_user.take(), delta.turns);
        let added = pairs.len();

        for pair in pairs {
            let exchange = self.build_exchange(index, pair, now);
            index.exchanges.push(exchange);
        }

        index.total_exchanges = index.exchanges.len() as u32;
        index.pending_user = pending;
        index.byte_offset = delta.end_offset.max(index.byte_offset);
        added
    }

    fn build_exchange(&self, index: &SessionIndex, pair: TurnPair, now: DateTime<Utc>) -> Exchange {
        let timestamp = pair
            .user
            .timestamp
            .or(pair.assistant.timestamp)
            .or_else(|| index.last_timestamp())
            .unwrap_or_else(|| now.fixed_offset());

        Exchange {
            idx: index.next_idx(),
            timestamp,
            preview: make_preview(&pair.user.text, self.settings.preview_length),
            user_text: truncate_text(&pair.user.text, self.settings.max_chars_per_message),
            assistant_text: truncate_text(
                &pair.assistant.text,
                self.settings.max_chars_per_message,
            ),
        }
    }
}

enum ReadResult {
    Delta(Delta),
    Rotated,
    AtEnd,
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        "2025-01-05T12:00:00Z".parse().unwrap()
    }

    fn user(text: &str, ts: &str) -> String {
        format!(
            r#"{{"type":"user","message":{{"role":"user","content":"{}"}},"timestamp":"{}"}}"#,
            text, ts
        )
    }

    fn assistant(text: &str, ts: &str) -> String {
        format!(
            r#"{{"type":"assistant","message":{{"role":"assistant","content":[{{"type":"text","text":"{}"}}]}},"timestamp":"{}"}}"#,
            text, ts
        )
    }

    fn append(path: &Path, lines: &[String]) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: IndexStore,
        transcript: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path().join("index.json"), dir.path().join("sessions"));
        let transcript = dir.path().join("transcript.jsonl");
        Fixture {
            _dir: dir,
            store,
            transcript,
        }
    }

    fn two_exchanges() -> Vec<String> {
        vec![
            user("How do I add an API endpoint?", "2025-01-05T09:00:00Z"),
            assistant("Use a router.", "2025-01-05T09:00:05Z"),
            user("And tests?", "2025-01-05T09:05:00Z"),
            assistant("Use tempfile.", "2025-01-05T09:05:05Z"),
        ]
    }

    #[test]
    fn test_first_run_builds_index() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(
            report.outcome,
            UpdateOutcome::Rebuilt {
                reason: RebuildReason::Missing,
                added: 2
            }
        );
        assert_eq!(report.index.total_exchanges, 2);
        assert_eq!(report.index.exchanges[0].idx, 1);
        assert_eq!(report.index.exchanges[1].idx, 2);
        assert_eq!(
            report.index.session_start.to_rfc3339(),
            "2025-01-05T09:00:00+00:00"
        );
        assert_eq!(
            report.index.byte_offset,
            fs::metadata(&f.transcript).unwrap().len()
        );

        let stored = f.store.load().unwrap().unwrap();
        assert_eq!(stored, report.index);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let first = indexer.update("s1", &f.transcript, now()).unwrap();
        let second = indexer.update("s1", &f.transcript, now()).unwrap();

        assert_eq!(second.outcome, UpdateOutcome::Unchanged);
        assert_eq!(second.index.exchanges, first.index.exchanges);
        assert_eq!(second.index.byte_offset, first.index.byte_offset);
    }

    #[test]
    fn test_appended_exchanges_continue_numbering() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let indexer = Indexer::new(&f.store, IndexSettings::default());
        indexer.update("s1", &f.transcript, now()).unwrap();

        append(
            &f.transcript,
            &[
                user("Third", "2025-01-05T10:00:00Z"),
                assistant("Reply", "2025-01-05T10:00:01Z"),
            ],
        );
        let report = indexer.update("s1", &f.transcript, now()).unwrap();

        assert_eq!(report.outcome, UpdateOutcome::Updated { added: 1 });
        assert_eq!(report.index.exchanges[2].idx, 3);
        assert_eq!(report.index.exchanges[2].user_text, "Third");
    }

    #[test]
    fn test_reply_in_later_invocation_is_paired() {
        let f = fixture();
        append(&f.transcript, &[user("Pending question", "2025-01-05T09:00:00Z")]);
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(report.index.total_exchanges, 0);
        assert!(report.index.pending_user.is_some());

        append(&f.transcript, &[assistant("Late answer", "2025-01-05T09:01:00Z")]);
        let report = indexer.update("s1", &f.transcript, now()).unwrap();

        assert_eq!(report.outcome, UpdateOutcome::Updated { added: 1 });
        assert_eq!(report.index.exchanges[0].user_text, "Pending question");
        assert_eq!(report.index.exchanges[0].assistant_text, "Late answer");
        assert!(report.index.pending_user.is_none());
    }

    #[test]
    fn test_partial_line_is_not_consumed() {
        let f = fixture();
        append(&f.transcript, &[user("Q", "2025-01-05T09:00:00Z")]);
        let full_len = fs::metadata(&f.transcript).unwrap().len();
        let reply = assistant("A", "2025-01-05T09:00:01Z");
        {
            let mut file = fs::OpenOptions::new().append(true).open(&f.transcript).unwrap();
            write!(file, "{}", &reply[..10]).unwrap();
        }
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(report.index.byte_offset, full_len);
        assert_eq!(report.index.total_exchanges, 0);

        let again = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(again.outcome, UpdateOutcome::Unchanged);

        {
            let mut file = fs::OpenOptions::new().append(true).open(&f.transcript).unwrap();
            writeln!(file, "{}", &reply[10..]).unwrap();
        }
        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(report.outcome, UpdateOutcome::Updated { added: 1 });
    }

    #[test]
    fn test_truncated_transcript_triggers_rebuild() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let indexer = Indexer::new(&f.store, IndexSettings::default());
        indexer.update("s1", &f.transcript, now()).unwrap();

        fs::write(&f.transcript, "").unwrap();
        append(
            &f.transcript,
            &[
                user("Fresh", "2025-01-06T08:00:00Z"),
                assistant("Start", "2025-01-06T08:00:01Z"),
            ],
        );
        let report = indexer.update("s1", &f.transcript, now()).unwrap();

        assert_eq!(
            report.outcome,
            UpdateOutcome::Rebuilt {
                reason: RebuildReason::Rollover,
                added: 1
            }
        );
        assert_eq!(report.index.total_exchanges, 1);
        assert_eq!(report.index.exchanges[0].user_text, "Fresh");
        assert_eq!(
            report.index.byte_offset,
            fs::metadata(&f.transcript).unwrap().len()
        );
    }

    #[test]
    fn test_corrupt_index_is_rebuilt() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        fs::write(f.store.path(), "{\"session_id\": ").unwrap();
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(
            report.outcome,
            UpdateOutcome::Rebuilt {
                reason: RebuildReason::CorruptIndex,
                added: 2
            }
        );
        assert!(f.store.load().unwrap().is_some());
    }

    #[test]
    fn test_new_session_replaces_index() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let indexer = Indexer::new(&f.store, IndexSettings::default());
        indexer.update("s1", &f.transcript, now()).unwrap();

        let report = indexer.update("s2", &f.transcript, now()).unwrap();
        assert_eq!(
            report.outcome,
            UpdateOutcome::Rebuilt {
                reason: RebuildReason::NewSession,
                added: 2
            }
        );
        assert_eq!(report.index.session_id, "s2");
        assert!(!f.store.path().with_file_name("sessions").exists());
    }

    #[test]
    fn test_new_session_keeps_previous_when_configured() {
        let f = fixture();
        append(&f.transcript, &two_exchanges());
        let settings = IndexSettings {
            retain_previous_sessions: true,
            ..IndexSettings::default()
        };
        let indexer = Indexer::new(&f.store, settings);
        indexer.update("s1", &f.transcript, now()).unwrap();
        indexer.update("s2", &f.transcript, now()).unwrap();

        let kept = f.store.path().with_file_name("sessions").join("s1.json");
        assert!(kept.exists());
    }

    #[test]
    fn test_missing_transcript_creates_empty_index_once() {
        let f = fixture();
        let indexer = Indexer::new(&f.store, IndexSettings::default());

        let report = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(
            report.outcome,
            UpdateOutcome::Rebuilt {
                reason: RebuildReason::Missing,
                added: 0
            }
        );
        assert_eq!(report.index.byte_offset, 0);
        assert_eq!(report.index.session_start, now().fixed_offset());

        let again = indexer.update("s1", &f.transcript, now()).unwrap();
        assert_eq!(again.outcome, UpdateOutcome::Unchanged);
    }

    #[test]
    fn test_long_text_is_truncated_and_previewed() {
        let f = fixture();
        let long = "word ".repeat(400);
        append(
            &f.transcript,
            &[
                user(&long, "2025-01-05T09:00:00Z"),
                assistant(&long, "2025-01-05T09:00:01Z"),
            ],
        );
        let indexer = Indexer::new(&f.store, IndexSettings::default());
        let report = indexer.update("s1", &f.transcript, now()).unwrap();

        let exchange = &report.index.exchanges[0];
        assert_eq!(exchange.preview.chars().count(), 80);
        assert!(exchange.user_text.ends_with("[...truncated...]"));
        assert!(exchange.assistant_text.len() < long.len());
    }

    #[test]
    fn test_missing_timestamps_fall_back() {
        let f = fixture();
        append(
            &f.transcript,
            &[
                user("First", "2025-01-05T09:00:00Z"),
                assistant("One", "2025-01-05T09:00:01Z"),
                r#"{"type":"user","message":{"content":"No time"}}"#.to_string(),
                r#"{"type":"assistant","message":{"content":"Still none"}}"#.to_string(),
            ],
        );
        let indexer = Indexer::new(&f.store, IndexSettings::default());
        let report = indexer.update("s1", &f.transcript, now()).unwrap();

        assert_eq!(
            report.index.exchanges[1].timestamp,
            report.index.exchanges[0].timestamp
        );
    }
}
