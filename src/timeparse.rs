//! Free-form time expressions ("2pm", "jan 5 14:30", "yesterday 10am")
//!
//! Each grammar is an independent matcher tried in a fixed order; the first
//! match wins. Time-only expressions carry no date, so they are resolved
//! against the calendar dates present in the index: whichever candidate puts
//! the time closest to "now" wins, preferring the one not in the future on
//! a tie.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use regex::{Captures, Regex};

use crate::error::TimeParseError;

/// Which grammar accepted the expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// "2pm"
    HourMeridiem,
    /// "2:30pm", "2:30 pm"
    HourMinute,
    /// "14:30"
    Clock24,
    /// "jan 5 2pm"
    MonthNameDay,
    /// "1/5 2pm" (month/day)
    NumericMonthDay,
    /// "yesterday 2pm"
    RelativeDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    pub at: DateTime<FixedOffset>,
    pub grammar: Grammar,
    /// Whether the expression named a date, or it was inferred
    pub date_given: bool,
}

const USAGE_HINT: &str =
    "try formats like '2pm', '2:30pm', '14:30', 'jan 5 2pm', '1/5 2pm' or 'yesterday 2pm'";

const MERIDIEM: &str = r"([ap])\.?m\.?";

static HOUR_MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(\d{{1,2}})\s*{}$", MERIDIEM)).unwrap());

static HOUR_MINUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(\d{{1,2}}):(\d{{2}})(?:\s*{})?$", MERIDIEM)).unwrap()
});

static CLOCK_24: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

const MONTH_DAY: &str =
    r"(?P<month>[a-z]{3,9})\.?\s+(?P<day>\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(?P<year>\d{4}))?";
const NUMERIC_DAY: &str = r"(?P<month>\d{1,2})/(?P<day>\d{1,2})(?:/(?P<year>\d{4}|\d{2}))?";
const RELATIVE_DAY: &str = r"(?P<word>yesterday|today)";

/// Date-then-time and time-then-date forms for each dated grammar
struct DatedPatterns {
    leading: Regex,
    trailing: Regex,
}

impl DatedPatterns {
    fn new(date: &str) -> Self {
        Self {
            leading: Regex::new(&format!(r"^{},?\s+(?P<time>.+)$", date)).unwrap(),
            trailing: Regex::new(&format!(r"^(?P<time>.+?),?\s+{}$", date)).unwrap(),
        }
    }

    /// Captures plus the time part, whichever order matched
    fn captures<'t>(&self, input: &'t str) -> Option<(Captures<'t>, &'t str)> {
        [&self.leading, &self.trailing].iter().find_map(|re| {
            let caps = re.captures(input)?;
            let time = caps.name("time")?.as_str();
            Some((caps, time))
        })
    }
}

static MONTH_NAME_DAY: LazyLock<DatedPatterns> = LazyLock::new(|| DatedPatterns::new(MONTH_DAY));
static NUMERIC_MONTH_DAY: LazyLock<DatedPatterns> =
    LazyLock::new(|| DatedPatterns::new(NUMERIC_DAY));
static RELATIVE: LazyLock<DatedPatterns> = LazyLock::new(|| DatedPatterns::new(RELATIVE_DAY));

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Result of a matcher: a time of day, and a date when the expression named one
struct Match {
    grammar: Grammar,
    time: NaiveTime,
    date: Option<NaiveDate>,
}

type Matcher = fn(&str, NaiveDate) -> Option<Match>;

/// Priority order; first match wins
const MATCHERS: [Matcher; 6] = [
    match_hour_meridiem,
    match_hour_minute,
    match_clock_24,
    match_month_name_day,
    match_numeric_month_day,
    match_relative_day,
];

/// Time parser bound to a reference time zone and the dates seen in an index
#[derive(Debug, Clone)]
pub struct TimeParser {
    tz: FixedOffset,
    candidate_dates: BTreeSet<NaiveDate>,
}

impl TimeParser {
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            tz,
            candidate_dates: BTreeSet::new(),
        }
    }

    /// Dates a time-only expression may resolve to
    pub fn with_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.candidate_dates.extend(dates);
        self
    }

    pub fn parse(&self, expression: &str, now: DateTime<Utc>) -> Result<ParsedTime, TimeParseError> {
        let input = normalize(expression);
        if input.is_empty() {
            return Err(TimeParseError::new(expression, "empty time expression"));
        }

        let now = now.with_timezone(&self.tz);
        let today = now.date_naive();

        let found = MATCHERS.iter().find_map(|matcher| matcher(&input, today));
        let found = match found {
            Some(m) => m,
            None => return Err(TimeParseError::new(expression, USAGE_HINT)),
        };

        let at = match found.date {
            Some(date) => self.localize(date, found.time),
            None => self.resolve_time_only(found.time, now),
        };

        match at {
            Some(at) => Ok(ParsedTime {
                at,
                grammar: found.grammar,
                date_given: found.date.is_some(),
            }),
            None => Err(TimeParseError::new(expression, "time does not exist in this time zone")),
        }
    }

    fn localize(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
        date.and_time(time).and_local_timezone(self.tz).single()
    }

    /// Pick the candidate date that puts `time` closest to `now`
    fn resolve_time_only(
        &self,
        time: NaiveTime,
        now: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        if self.candidate_dates.is_empty() {
            return self.localize(now.date_naive(), time);
        }

        self.candidate_dates
            .iter()
            .filter_map(|date| self.localize(*date, time))
            .min_by_key(|at| {
                let delta = (*at - now).num_seconds().abs();
                (delta, *at > now)
            })
    }
}

fn normalize(expression: &str) -> String {
    let lowered = expression.trim().to_lowercase();
    let unquoted = lowered.trim_matches(|c: char| c == '"' || c == '\'');
    let collapsed = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix("around ") {
        Some(rest) => rest.trim().to_string(),
        None => collapsed,
    }
}

fn number(caps: &Captures, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn named_number(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn to_24h(hour: u32, meridiem: &str) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    match meridiem {
        "a" => Some(hour % 12),
        _ => Some(hour % 12 + 12),
    }
}

fn match_hour_meridiem(input: &str, _today: NaiveDate) -> Option<Match> {
    let caps = HOUR_MERIDIEM.captures(input)?;
    let hour = to_24h(number(&caps, 1)?, caps.get(2)?.as_str())?;
    Some(Match {
        grammar: Grammar::HourMeridiem,
        time: NaiveTime::from_hms_opt(hour, 0, 0)?,
        date: None,
    })
}

fn match_hour_minute(input: &str, _today: NaiveDate) -> Option<Match> {
    let caps = HOUR_MINUTE.captures(input)?;
    let hour = number(&caps, 1)?;
    let minute = number(&caps, 2)?;
    let hour = match caps.get(3) {
        Some(meridiem) => to_24h(hour, meridiem.as_str())?,
        None if (1..=12).contains(&hour) => hour,
        None => return None,
    };
    Some(Match {
        grammar: Grammar::HourMinute,
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        date: None,
    })
}

fn match_clock_24(input: &str, _today: NaiveDate) -> Option<Match> {
    let caps = CLOCK_24.captures(input)?;
    Some(Match {
        grammar: Grammar::Clock24,
        time: NaiveTime::from_hms_opt(number(&caps, 1)?, number(&caps, 2)?, 0)?,
        date: None,
    })
}

/// Any of the time-only grammars
fn match_time_of_day(input: &str, today: NaiveDate) -> Option<NaiveTime> {
    MATCHERS[..3]
        .iter()
        .find_map(|matcher| matcher(input, today))
        .map(|m| m.time)
}

fn month_number(name: &str) -> Option<u32> {
    if name == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(name))
        .map(|i| i as u32 + 1)
}

/// Explicit year, or the most recent year that keeps the date from being in the future
fn resolve_date(month: u32, day: u32, year: Option<i32>, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date <= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() - 1, month, day),
    }
}

fn year_from(caps: &Captures) -> Option<Option<i32>> {
    match caps.name("year") {
        None => Some(None),
        Some(m) => {
            let value: i32 = m.as_str().parse().ok()?;
            Some(Some(if m.as_str().len() == 2 { 2000 + value } else { value }))
        }
    }
}

fn match_month_name_day(input: &str, today: NaiveDate) -> Option<Match> {
    let (caps, time) = MONTH_NAME_DAY.captures(input)?;
    let month = month_number(caps.name("month")?.as_str())?;
    let day = named_number(&caps, "day")?;
    let date = resolve_date(month, day, year_from(&caps)?, today)?;
    Some(Match {
        grammar: Grammar::MonthNameDay,
        time: match_time_of_day(time, today)?,
        date: Some(date),
    })
}

fn match_numeric_month_day(input: &str, today: NaiveDate) -> Option<Match> {
    let (caps, time) = NUMERIC_MONTH_DAY.captures(input)?;
    let month = named_number(&caps, "month")?;
    let day = named_number(&caps, "day")?;
    let date = resolve_date(month, day, year_from(&caps)?, today)?;
    Some(Match {
        grammar: Grammar::NumericMonthDay,
        time: match_time_of_day(time, today)?,
        date: Some(date),
    })
}

fn match_relative_day(input: &str, today: NaiveDate) -> Option<Match> {
    let (caps, time) = RELATIVE.captures(input)?;
    let date = match caps.name("word")?.as_str() {
        "yesterday" => today - Duration::days(1),
        _ => today,
    };
    Some(Match {
        grammar: Grammar::RelativeDay,
        time: match_time_of_day(time, today)?,
        date: Some(date),
    })
}
