//! Hook command implementation
//!
//! Runs on every prompt submission: reads the host's JSON payload from stdin,
//! brings the index up to date, and logs recall events. Never blocks the host.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::events::{EventLog, EventSink};
use crate::indexer::{IndexSettings, Indexer};
use crate::store::IndexStore;
use crate::Config;

const RECALL_COMMAND: &str = "/recall";

#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

pub fn run(config: &Config) -> Result<()> {
    let mut raw = String::new();
    let response = match std::io::stdin().read_to_string(&mut raw) {
        Ok(_) => {
            let sink = EventLog::new(config.event_log_path());
            respond(config, &raw, &sink, Utc::now())
        }
        Err(e) => error_response(&anyhow::Error::from(e)),
    };
    println!("{}", response);
    Ok(())
}

/// Response object for one hook payload. Errors become a non-blocking message.
pub fn respond(config: &Config, raw: &str, sink: &dyn EventSink, now: DateTime<Utc>) -> Value {
    match handle(config, raw, sink, now) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Hook failed: {:#}", e);
            error_response(&e)
        }
    }
}

fn error_response(err: &anyhow::Error) -> Value {
    json!({
        "systemMessage": format!("[context-recall] Hook error (non-blocking): {:#}", err)
    })
}

fn handle(config: &Config, raw: &str, sink: &dyn EventSink, now: DateTime<Utc>) -> Result<Value> {
    let input: HookInput = if raw.trim().is_empty() {
        HookInput::default()
    } else {
        serde_json::from_str(raw).context("Invalid hook payload")?
    };
    let session_id = input
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let store = IndexStore::from_config(config);
    let total = match input.transcript_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            let indexer = Indexer::new(&store, IndexSettings::from_config(config));
            let report = indexer.update(&session_id, Path::new(&path), now)?;
            tracing::debug!(outcome = ?report.outcome, "Hook indexed transcript");
            report.index.total_exchanges
        }
        None => {
            tracing::debug!("No transcript path in hook payload");
            store
                .load()?
                .map(|index| index.total_exchanges)
                .unwrap_or(0)
        }
    };

    let is_recall = input
        .user_prompt
        .as_deref()
        .map(|p| p.trim().to_lowercase().starts_with(RECALL_COMMAND))
        .unwrap_or(false);
    if !is_recall {
        return Ok(json!({}));
    }

    if let Err(e) = sink.record_event(&session_id, total) {
        tracing::warn!("Failed to record recall event: {:#}", e);
    }
    // stdout carries only the response object
    eprintln!("{}", recall_notice(total));
    tracing::info!(session = %session_id, exchanges = total, "Context recall triggered");

    Ok(json!({
        "systemMessage": format!("[Observability] Context recall logged at exchange #{}", total)
    }))
}

fn recall_notice(total: u32) -> String {
    format!("[context-recall] Context recall triggered at exchange #{}", total)
}
