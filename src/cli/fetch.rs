//! Fetch command implementation: the `last<N>` / `around` / `search` surface

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

use super::{load_index, query_error_message, resolve_timezone, NO_INDEX_HINT};
use crate::format::{no_matches, Formatter};
use crate::query::{Query, QueryEngine, SEARCH_LIMIT};
use crate::store::{Exchange, SessionIndex};
use crate::Config;

pub fn run(config: &Config, args: &[String]) -> Result<()> {
    let query = match Query::parse(args) {
        Ok(query) => query,
        Err(e) => {
            println!("{}", query_error_message(&e));
            return Ok(());
        }
    };

    let index = match load_index(config)? {
        Some(index) => index,
        None => {
            println!("{}", NO_INDEX_HINT);
            return Ok(());
        }
    };

    let tz = resolve_timezone(config);
    let formatter = Formatter::from_config(config, tz);
    println!("{}", answer(&index, &query, &formatter, tz, Utc::now()));
    Ok(())
}

/// Render the result of `query` against an index snapshot
pub fn answer(
    index: &SessionIndex,
    query: &Query,
    formatter: &Formatter,
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> String {
    let engine = QueryEngine::new(index, tz);
    let description = query.describe();

    match query {
        Query::Last(n) => formatter.render_exchanges(&engine.last(*n), &description, None),
        Query::Search(term) => {
            let result = engine.search(term);
            if result.matches.is_empty() {
                return no_matches(term);
            }
            let mut shown: Vec<&Exchange> = result.matches.clone();
            shown.sort_by_key(|e| e.idx);

            let body = formatter.render_exchanges(&shown, &description, None);
            if result.total_matches > SEARCH_LIMIT {
                format!(
                    "*Found {} matches for '{}', showing {} most recent:*\n\n{}",
                    result.total_matches, term, SEARCH_LIMIT, body
                )
            } else {
                body
            }
        }
        Query::Around(expression) => {
            let target = match engine.parse_time(expression, now) {
                Ok(target) => target,
                Err(e) => return query_error_message(&e),
            };
            let Some(around) = engine.around(&target) else {
                return "*No exchanges found in this session.*".to_string();
            };

            let body =
                formatter.render_exchanges(&around.exchanges, &description, Some(around.anchor_idx));
            let note = if target.date_given {
                None
            } else {
                formatter.multi_day_note(&engine.session_dates(), expression)
            };
            match note {
                Some(note) => format!("{}\n\n{}", note, body),
                None => body,
            }
        }
    }
}
