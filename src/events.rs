//! Observability sink for recall events

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};

/// Receives one event per recall invocation
pub trait EventSink {
    fn record_event(&self, session_id: &str, exchange_count: u32) -> Result<()>;
}

/// Appends one line per event to a plain-text log
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventSink for EventLog {
    fn record_event(&self, session_id: &str, exchange_count: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let line = format!(
            "{} | session={} | exchanges={} | CONTEXT_RECALL_TRIGGERED\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            session_id,
            exchange_count
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open event log {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("logs/recall-events.log"));

        log.record_event("abc", 3).unwrap();
        log.record_event("abc", 4).unwrap();

        let content = fs::read_to_string(dir.path().join("logs/recall-events.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| session=abc | exchanges=3 | CONTEXT_RECALL_TRIGGERED"));
        assert!(lines[1].contains("exchanges=4"));
    }
}
