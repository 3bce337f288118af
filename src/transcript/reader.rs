//! Offset-based incremental transcript reads

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{RecallError, Result};

use super::{parse_record, Turn};

/// Turns read from one transcript delta
#[derive(Debug, Default)]
pub struct Delta {
    pub turns: Vec<Turn>,
    /// Position just after the last complete line consumed
    pub end_offset: u64,
    /// Lines skipped as malformed
    pub skipped: usize,
}

/// Current transcript length in bytes
pub fn transcript_len(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| RecallError::TranscriptUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

/// Read complete lines after `offset`.
///
/// A trailing line without its newline is left for the next read, so
/// `end_offset` only ever lands on a line boundary. Malformed lines are
/// skipped and counted.
pub fn read_delta(path: &Path, offset: u64) -> Result<Delta> {
    let mut file = File::open(path).map_err(|source| RecallError::TranscriptUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = vec![];
    file.read_to_end(&mut buf)?;

    let complete_len = match buf.iter().rposition(|b| *b == b'\n') {
        Some(pos) => pos + 1,
        None => 0,
    };

    let mut delta = Delta {
        end_offset: offset + complete_len as u64,
        ..Delta::default()
    };

    let mut line_offset = offset;
    for raw in buf[..complete_len].split_inclusive(|b| *b == b'\n') {
        let start = line_offset;
        line_offset += raw.len() as u64;

        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line) {
            Ok(Some(turn)) => delta.turns.push(turn),
            Ok(None) => {}
            Err(reason) => {
                let err = RecallError::MalformedRecord {
                    offset: start,
                    reason,
                };
                tracing::debug!(path = %path.display(), "Skipping record: {}", err);
                delta.skipped += 1;
            }
        }
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const USER: &str = r#"{"type":"user","message":{"content":"Hello"},"timestamp":"2025-01-05T09:00:00Z"}"#;
    const ASSISTANT: &str = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hi there!"}]},"timestamp":"2025-01-05T09:00:05Z"}"#;

    #[test]
    fn test_reads_complete_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let content = format!("{}\n{}\n", USER, ASSISTANT);
        fs::write(&path, &content).unwrap();

        let delta = read_delta(&path, 0).unwrap();
        assert_eq!(delta.turns.len(), 2);
        assert_eq!(delta.turns[1].text, "Hi there!");
        assert_eq!(delta.end_offset, content.len() as u64);
        assert_eq!(delta.skipped, 0);
    }

    #[test]
    fn test_partial_trailing_line_is_deferred() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let first = format!("{}\n", USER);
        let partial = &ASSISTANT[..20];
        fs::write(&path, format!("{}{}", first, partial)).unwrap();

        let delta = read_delta(&path, 0).unwrap();
        assert_eq!(delta.turns.len(), 1);
        assert_eq!(delta.end_offset, first.len() as u64);
        assert_eq!(delta.skipped, 0);

        // Finish the line and read again from the cursor
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", &ASSISTANT[20..]).unwrap();

        let delta = read_delta(&path, delta.end_offset).unwrap();
        assert_eq!(delta.turns.len(), 1);
        assert_eq!(delta.turns[0].text, "Hi there!");
        assert_eq!(delta.end_offset, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        fs::write(&path, format!("{}\n{{broken\n\n{}\n", USER, ASSISTANT)).unwrap();

        let delta = read_delta(&path, 0).unwrap();
        assert_eq!(delta.turns.len(), 2);
        assert_eq!(delta.skipped, 1);
    }

    #[test]
    fn test_read_at_end_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.jsonl");
        let content = format!("{}\n", USER);
        fs::write(&path, &content).unwrap();

        let delta = read_delta(&path, content.len() as u64).unwrap();
        assert!(delta.turns.is_empty());
        assert_eq!(delta.end_offset, content.len() as u64);
    }

    #[test]
    fn test_missing_transcript_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.jsonl");
        assert!(matches!(
            read_delta(&path, 0),
            Err(RecallError::TranscriptUnavailable { .. })
        ));
        assert!(matches!(
            transcript_len(&path),
            Err(RecallError::TranscriptUnavailable { .. })
        ));
    }
}
