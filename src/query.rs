//! Queries over an index snapshot: last N, full-text search, and "around a time"
//!
//! All queries are pure reads of a loaded [`SessionIndex`].

use std::collections::BTreeSet;
use std::num::IntErrorKind;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::error::QueryError;
use crate::store::{Exchange, SessionIndex};
use crate::timeparse::{ParsedTime, TimeParser};

/// Exchanges per browse page
pub const PAGE_SIZE: usize = 20;

/// Most search matches returned
pub const SEARCH_LIMIT: usize = 10;

/// Exchanges returned around a time: the anchor plus two on each side
pub const AROUND_WINDOW: usize = 5;

/// Default count for a bare `last`
pub const DEFAULT_LAST: usize = 5;

pub struct SearchResult<'a> {
    /// Most recent first
    pub matches: Vec<&'a Exchange>,
    /// Matches before the cap was applied
    pub total_matches: usize,
}

pub struct AroundResult<'a> {
    /// Ascending by idx
    pub exchanges: Vec<&'a Exchange>,
    pub anchor_idx: u32,
}

pub struct QueryEngine<'a> {
    index: &'a SessionIndex,
    tz: FixedOffset,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a SessionIndex, tz: FixedOffset) -> Self {
        Self { index, tz }
    }

    pub fn exchanges(&self) -> &'a [Exchange] {
        &self.index.exchanges
    }

    /// The `n` most recent exchanges, oldest first. `n` is clamped to `[1, total]`.
    pub fn last(&self, n: usize) -> Vec<&'a Exchange> {
        let exchanges = self.exchanges();
        if exchanges.is_empty() {
            return vec![];
        }
        let n = n.clamp(1, exchanges.len());
        exchanges[exchanges.len() - n..].iter().collect()
    }

    /// Case-insensitive substring match over user and assistant text.
    pub fn search(&self, term: &str) -> SearchResult<'a> {
        let needle = term.to_lowercase();
        let mut matches: Vec<&Exchange> = self
            .exchanges()
            .iter()
            .rev()
            .filter(|e| {
                let haystack = format!("{}\n{}", e.user_text, e.assistant_text).to_lowercase();
                haystack.contains(&needle)
            })
            .collect();

        let total_matches = matches.len();
        matches.truncate(SEARCH_LIMIT);
        SearchResult {
            matches,
            total_matches,
        }
    }

    /// Exchanges surrounding the one closest in time to `target`.
    pub fn around(&self, target: &ParsedTime) -> Option<AroundResult<'a>> {
        let exchanges = self.exchanges();
        let anchor = self.anchor_position(target.at)?;

        let half = AROUND_WINDOW / 2;
        let start = anchor.saturating_sub(half);
        let end = (anchor + half + 1).min(exchanges.len());

        Some(AroundResult {
            exchanges: exchanges[start..end].iter().collect(),
            anchor_idx: exchanges[anchor].idx,
        })
    }

    /// Position of the exchange nearest `at`; ties go to the earlier one
    fn anchor_position(&self, at: DateTime<FixedOffset>) -> Option<usize> {
        self.exchanges()
            .iter()
            .enumerate()
            .min_by_key(|(position, e)| {
                let delta = e.timestamp - at;
                let distance = if delta < Duration::zero() { -delta } else { delta };
                (distance, *position)
            })
            .map(|(position, _)| position)
    }

    /// Browse page (most recent first) that holds exchange `idx`
    pub fn page_of(&self, idx: u32) -> usize {
        let total = self.exchanges().len();
        let position = (idx as usize).clamp(1, total.max(1)) - 1;
        let from_end = total.saturating_sub(1).saturating_sub(position);
        from_end / PAGE_SIZE + 1
    }

    /// Distinct calendar dates in the reference time zone, ascending
    pub fn session_dates(&self) -> Vec<NaiveDate> {
        self.exchanges()
            .iter()
            .map(|e| e.timestamp.with_timezone(&self.tz).date_naive())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Time parser that resolves time-only expressions against this session's dates
    pub fn time_parser(&self) -> TimeParser {
        TimeParser::new(self.tz).with_dates(self.session_dates())
    }

    pub fn parse_time(&self, expression: &str, now: DateTime<Utc>) -> Result<ParsedTime, QueryError> {
        Ok(self.time_parser().parse(expression, now)?)
    }
}

/// A textual query: `last<N>`, `around <time>`, `search <term>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Last(usize),
    Around(String),
    Search(String),
}

impl Query {
    /// Parse query arguments. No arguments means `last5`.
    pub fn parse(args: &[String]) -> Result<Self, QueryError> {
        let joined = args.join(" ");
        let input = joined.trim();
        if input.is_empty() {
            return Ok(Query::Last(DEFAULT_LAST));
        }

        let (command, rest) = match input.find(char::is_whitespace) {
            Some(pos) => (&input[..pos], input[pos..].trim()),
            None => (input, ""),
        };
        let command = command.to_lowercase();

        if let Some(count) = command.strip_prefix("last") {
            let count = if count.is_empty() { rest } else { count };
            if count.is_empty() {
                return Ok(Query::Last(DEFAULT_LAST));
            }
            // Zero and negative counts clamp to 1, oversized ones to the maximum
            return match count.parse::<i64>() {
                Ok(n) => Ok(Query::Last(usize::try_from(n.max(1)).unwrap_or(usize::MAX))),
                Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Query::Last(usize::MAX)),
                Err(e) if *e.kind() == IntErrorKind::NegOverflow => Ok(Query::Last(1)),
                Err(_) => Err(QueryError::Usage(format!(
                    "Invalid format: '{}'. Try 'last5' or 'last10'.",
                    input
                ))),
            };
        }

        match command.as_str() {
            "around" => {
                if rest.is_empty() {
                    return Err(QueryError::Usage(
                        "Please specify a time, e.g., 'around 2pm' or 'around \"jan 5 2pm\"'"
                            .to_string(),
                    ));
                }
                Ok(Query::Around(rest.to_string()))
            }
            "search" => {
                let term = strip_quotes(rest);
                if term.is_empty() {
                    return Err(QueryError::Usage(
                        "Please specify a search term, e.g., 'search authentication'".to_string(),
                    ));
                }
                Ok(Query::Search(term.to_string()))
            }
            _ => Err(QueryError::Usage(format!("Unknown command: '{}'", command))),
        }
    }

    /// Short description used in result headers
    pub fn describe(&self) -> String {
        match self {
            Query::Last(n) => format!("last{}", n),
            Query::Around(expr) => format!("around {}", expr),
            Query::Search(term) => format!("search '{}'", term),
        }
    }
}

/// A quoted phrase is searched as-is, without its quotes
fn strip_quotes(term: &str) -> &str {
    let term = term.trim();
    for quote in ['"', '\''] {
        if term.len() >= 2 && term.starts_with(quote) && term.ends_with(quote) {
            return term[1..term.len() - 1].trim();
        }
    }
    term
}
