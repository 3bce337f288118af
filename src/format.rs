//! Markdown rendering: browse pages, search listings, and fetched exchanges
//!
//! Pages are a pure function of the index snapshot, the page number and the
//! reference time zone, so the same inputs always render the same text.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::query::{SearchResult, PAGE_SIZE};
use crate::store::{Exchange, SessionIndex};
use crate::transcript::truncate_text;
use crate::Config;

/// One page of the index, most recent exchange first
#[derive(Debug)]
pub struct Page<'a> {
    /// 1-based, already clamped
    pub number: usize,
    pub count: usize,
    pub exchanges: Vec<&'a Exchange>,
}

/// Number of pages for `total` exchanges (at least one)
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE).max(1)
}

/// Slice out page `requested`, clamping it into range
pub fn paginate(exchanges: &[Exchange], requested: usize) -> Page<'_> {
    let count = page_count(exchanges.len());
    let number = requested.clamp(1, count);
    let exchanges = exchanges
        .iter()
        .rev()
        .skip((number - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();
    Page {
        number,
        count,
        exchanges,
    }
}

pub struct Formatter {
    tz: FixedOffset,
    max_chars_per_message: usize,
    max_total_chars: usize,
}

impl Formatter {
    pub fn new(tz: FixedOffset, max_chars_per_message: usize, max_total_chars: usize) -> Self {
        Self {
            tz,
            max_chars_per_message,
            max_total_chars,
        }
    }

    pub fn from_config(config: &Config, tz: FixedOffset) -> Self {
        Self::new(
            tz,
            config.display.max_chars_per_message,
            config.display.max_total_chars,
        )
    }

    fn local_date(&self, ts: &DateTime<FixedOffset>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// "2:30 pm"
    pub fn time(&self, ts: &DateTime<FixedOffset>) -> String {
        ts.with_timezone(&self.tz)
            .format("%-I:%M %p")
            .to_string()
            .to_lowercase()
    }

    /// "Jan 05, 2025 at 2:30 PM"
    pub fn long_date(&self, ts: &DateTime<FixedOffset>) -> String {
        ts.with_timezone(&self.tz)
            .format("%b %d, %Y at %-I:%M %p")
            .to_string()
    }

    /// "Jan 5"
    pub fn short_date(&self, date: NaiveDate) -> String {
        date.format("%b %-d").to_string()
    }

    /// "Jan 5" for a single-day session, "Jan 5 - Jan 7" otherwise
    pub fn date_range(&self, exchanges: &[Exchange]) -> Option<String> {
        let first = self.local_date(&exchanges.first()?.timestamp);
        let last = self.local_date(&exchanges.last()?.timestamp);
        let (start, end) = (first.min(last), first.max(last));
        if start == end {
            Some(self.short_date(start))
        } else {
            Some(format!("{} - {}", self.short_date(start), self.short_date(end)))
        }
    }

    /// Previews grouped under a date header whenever the date changes
    fn push_grouped(&self, lines: &mut Vec<String>, exchanges: &[&Exchange]) {
        let mut current: Option<NaiveDate> = None;
        for exchange in exchanges {
            let date = self.local_date(&exchange.timestamp);
            if current != Some(date) {
                current = Some(date);
                lines.push(String::new());
                lines.push(format!("**{}:**", self.short_date(date)));
            }
            lines.push(format!(
                "**#{}** [{}] \"{}\"",
                exchange.idx,
                self.time(&exchange.timestamp),
                exchange.preview
            ));
        }
    }

    /// Browse page `requested` of the index
    pub fn render_page(&self, index: &SessionIndex, requested: usize) -> String {
        if index.exchanges.is_empty() {
            return "*No exchanges found in this session.*".to_string();
        }

        let page = paginate(&index.exchanges, requested);
        let date_info = self
            .date_range(&index.exchanges)
            .map(|r| format!(" ({})", r))
            .unwrap_or_default();

        let mut lines = vec![
            format!(
                "**Session started:** {}{}",
                self.long_date(&index.session_start),
                date_info
            ),
            format!("**Total exchanges:** {}", index.total_exchanges),
            String::new(),
            format!(
                "**Showing page {} of {}** (most recent first):",
                page.number, page.count
            ),
        ];

        self.push_grouped(&mut lines, &page.exchanges);

        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("**Navigation:**".to_string());
        if page.number > 1 {
            lines.push(format!("- Show newer: page {}", page.number - 1));
        }
        if page.number < page.count {
            lines.push(format!("- Show older: page {}", page.number + 1));
        }
        lines.push("- Jump to time: e.g., \"around 2pm\" or \"around jan 5 2pm\"".to_string());
        lines.push("- Search: e.g., \"search authentication\"".to_string());

        lines.join("\n")
    }

    /// Preview listing of search matches, most recent first
    pub fn render_search_listing(&self, result: &SearchResult, term: &str) -> String {
        if result.matches.is_empty() {
            return no_matches(term);
        }

        let mut lines = vec![format!(
            "**Search results for \"{}\":** ({} matches)",
            term, result.total_matches
        )];
        self.push_grouped(&mut lines, &result.matches);
        if result.total_matches > result.matches.len() {
            lines.push(format!(
                "*... and {} more matches*",
                result.total_matches - result.matches.len()
            ));
        }
        lines.join("\n")
    }

    /// Full text of fetched exchanges, bounded by the total size limit
    pub fn render_exchanges(
        &self,
        exchanges: &[&Exchange],
        description: &str,
        anchor_idx: Option<u32>,
    ) -> String {
        if exchanges.is_empty() {
            return "*No exchanges found.*".to_string();
        }

        let mut lines = vec![
            format!(
                "*Fetched {} exchange(s) ({}):*",
                exchanges.len(),
                description
            ),
            String::new(),
        ];
        let mut total_chars = 0;

        for (shown, exchange) in exchanges.iter().enumerate() {
            let user_text = truncate_text(&exchange.user_text, self.max_chars_per_message);
            let assistant_text =
                truncate_text(&exchange.assistant_text, self.max_chars_per_message);

            let exchange_chars = user_text.chars().count() + assistant_text.chars().count();
            if total_chars + exchange_chars > self.max_total_chars {
                lines.push(format!(
                    "*[Reached size limit - {} more exchanges not shown]*",
                    exchanges.len() - shown
                ));
                break;
            }

            let date = self.short_date(self.local_date(&exchange.timestamp));
            let marker = if anchor_idx == Some(exchange.idx) {
                " (closest match)"
            } else {
                ""
            };
            lines.push(format!(
                "### Exchange #{} [{} {}]{}",
                exchange.idx,
                date,
                self.time(&exchange.timestamp),
                marker
            ));
            lines.push(String::new());
            lines.push(format!("**User:**\n{}", user_text));
            lines.push(String::new());
            if !assistant_text.is_empty() {
                lines.push(format!("**Assistant:**\n{}", assistant_text));
                lines.push(String::new());
            }
            lines.push("---".to_string());
            lines.push(String::new());

            total_chars += exchange_chars;
        }

        lines.join("\n")
    }

    /// Note shown when a time-only query runs over a multi-day session
    pub fn multi_day_note(&self, dates: &[NaiveDate], expression: &str) -> Option<String> {
        if dates.len() < 2 {
            return None;
        }
        let days: Vec<String> = dates.iter().map(|d| self.short_date(*d)).collect();
        Some(format!(
            "*Note: Session spans {} days: {}*\n*Showing closest match to {}. Specify date for precision (e.g., 'jan 5 2pm')*",
            dates.len(),
            days.join(", "),
            expression
        ))
    }
}

pub fn no_matches(term: &str) -> String {
    format!(
        "*No exchanges found matching \"{}\"*\n*Search looks in both user prompts AND assistant responses.*",
        term
    )
}
