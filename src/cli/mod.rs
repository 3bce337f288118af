pub mod fetch;
pub mod hook;
pub mod index;
pub mod show;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};

use crate::error::{QueryError, RecallError};
use crate::store::{IndexStore, SessionIndex};
use crate::Config;

pub(crate) const NO_INDEX_HINT: &str =
    "*No conversation index found. The index is built by the hook on each prompt; run 'recall index --session <id> --transcript <path>' to build it by hand.*";

const QUERY_USAGE: &str = "**Usage:**
- `last5` or `last 10`: the most recent exchanges
- `around 2pm` or `around \"jan 5 2:30pm\"`: exchanges near a time
- `search authentication` or `search \"API endpoint\"`: text search";

/// Load the current index snapshot, if one has been built.
///
/// A corrupt index reads as missing; the next hook run rebuilds it.
pub(crate) fn load_index(config: &Config) -> Result<Option<SessionIndex>> {
    let store = IndexStore::from_config(config);
    match store.load() {
        Ok(index) => Ok(index),
        Err(e @ RecallError::CorruptIndex { .. }) => {
            tracing::warn!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to load index {}", store.path().display())),
    }
}

/// Configured reference time zone, or UTC when the setting is invalid
pub(crate) fn resolve_timezone(config: &Config) -> FixedOffset {
    config.timezone().unwrap_or_else(|e| {
        tracing::warn!(
            timezone = %config.display.timezone,
            "Invalid timezone, using UTC: {:#}",
            e
        );
        Utc.fix()
    })
}

/// User-facing text for a rejected query
pub(crate) fn query_error_message(err: &QueryError) -> String {
    match err {
        QueryError::Usage(msg) => format!("*{}*\n\n{}", msg, QUERY_USAGE),
        QueryError::Time(e) => format!(
            "*Could not parse time: '{}'*\n\n{}",
            e.expression, e.reason
        ),
    }
}
