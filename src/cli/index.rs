//! Index command implementation

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::indexer::{IndexSettings, Indexer, UpdateOutcome};
use crate::store::IndexStore;
use crate::Config;

pub fn run(config: &Config, session_id: &str, transcript: &str) -> Result<()> {
    let store = IndexStore::from_config(config);
    let indexer = Indexer::new(&store, IndexSettings::from_config(config));
    let transcript = shellexpand::tilde(transcript).to_string();

    let report = indexer
        .update(session_id, Path::new(&transcript), Utc::now())
        .with_context(|| format!("Failed to index transcript {}", transcript))?;

    let total = report.index.total_exchanges;
    match report.outcome {
        UpdateOutcome::Unchanged => {
            println!("Index up to date ({} exchanges).", total);
        }
        UpdateOutcome::Updated { added } => {
            println!("Indexed {} new exchange(s), {} total.", added, total);
        }
        UpdateOutcome::Rebuilt { reason, added } => {
            println!(
                "Rebuilt index ({}): {} exchange(s) indexed.",
                reason.as_str(),
                added
            );
        }
    }
    println!("Index: {}", store.path().display());

    Ok(())
}
