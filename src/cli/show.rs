//! Show command implementation: browse the index page by page

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

use super::{load_index, query_error_message, resolve_timezone, NO_INDEX_HINT};
use crate::format::Formatter;
use crate::query::QueryEngine;
use crate::store::SessionIndex;
use crate::Config;

pub fn run(
    config: &Config,
    page: usize,
    around: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let index = match load_index(config)? {
        Some(index) => index,
        None => {
            println!("{}", NO_INDEX_HINT);
            return Ok(());
        }
    };

    let tz = resolve_timezone(config);
    let formatter = Formatter::from_config(config, tz);
    let out = browse(
        &index,
        &formatter,
        tz,
        page,
        around.as_deref(),
        search.as_deref(),
        Utc::now(),
    );
    println!("{}", out);
    Ok(())
}

/// Page listing, optionally jumping to a time or filtering by a term
pub fn browse(
    index: &SessionIndex,
    formatter: &Formatter,
    tz: FixedOffset,
    page: usize,
    around: Option<&str>,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let engine = QueryEngine::new(index, tz);

    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        return formatter.render_search_listing(&engine.search(term), term);
    }

    let page = match around.map(str::trim).filter(|t| !t.is_empty()) {
        Some(expression) => {
            let target = match engine.parse_time(expression, now) {
                Ok(target) => target,
                Err(e) => return query_error_message(&e),
            };
            match engine.around(&target) {
                Some(found) => engine.page_of(found.anchor_idx),
                None => page,
            }
        }
        None => page,
    };

    formatter.render_page(index, page)
}
