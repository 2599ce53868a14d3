//! Natural-language due-date extraction for task lines.
//!
//! Resolution order (first match wins):
//! 1. explicit dates: YYYY-MM-DD, MM-DD, MM/DD, MM.DD
//! 2. offsets: +Nd, +Nw
//! 3. named days: 今天/今日, 明天/明日, 后天
//! 4. weekday references: 下周X/下星期X/下礼拜X, then 周X/星期X/礼拜X
//! 5. no token found: default to tomorrow
//!
//! When the year is omitted from an explicit date the current year is
//! used even if that date has already passed; there is no automatic
//! rollover to next year.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

/// Lines beyond this count are dropped from one submission.
pub const MAX_INPUT_LINES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub content: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("该行去掉日期后没有任务内容")]
    NoContent,
}

/// Outcome for one input line, keyed by its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub line_no: usize,
    pub result: Result<ParsedLine, ParseFailure>,
}

struct DateMatch {
    date: NaiveDate,
    span: Range<usize>,
}

type Matcher = fn(&str, NaiveDate) -> Option<DateMatch>;

/// Tried in order; each matcher either claims a span of the line or
/// declines. Adding a new date format means adding one entry here.
const MATCHERS: &[Matcher] = &[
    match_full_date,
    match_month_day,
    match_day_offset,
    match_week_offset,
    match_named_day,
    match_next_week_weekday,
    match_weekday,
];

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[-/.](\d{1,2})").unwrap());
static DAY_OFFSET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\+(\d+)d").unwrap());
static WEEK_OFFSET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\+(\d+)w").unwrap());

const NAMED_DAYS: &[(&str, u64)] = &[
    ("今天", 0),
    ("今日", 0),
    ("明天", 1),
    ("明日", 1),
    ("后天", 2),
];

const WEEKDAY_PREFIXES: &[&str] = &["周", "星期", "礼拜"];
const NEXT_WEEK_PREFIXES: &[&str] = &["下周", "下星期", "下礼拜"];

// Monday = 0 .. Sunday = 6, matching chrono's num_days_from_monday.
const WEEKDAY_CHARS: &[(&str, u32)] = &[
    ("一", 0),
    ("二", 1),
    ("三", 2),
    ("四", 3),
    ("五", 4),
    ("六", 5),
    ("日", 6),
    ("天", 6),
];

/// Today's calendar date as the user sees it.
pub fn today_in_tz(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Extract a due date from one line, returning the date and the line
/// with the matched token removed. Never fails: an unrecognized line
/// falls back to tomorrow with the whole line as content.
pub fn resolve_date(line: &str, today: NaiveDate) -> (NaiveDate, String) {
    for matcher in MATCHERS {
        if let Some(m) = matcher(line, today) {
            let mut rest = String::with_capacity(line.len());
            rest.push_str(&line[..m.span.start]);
            rest.push_str(&line[m.span.end..]);
            return (m.date, rest.trim().to_string());
        }
    }
    (today + Days::new(1), line.trim().to_string())
}

/// Parse a multi-line submission. Each non-blank line is parsed
/// independently; failures on some lines never block the others. The
/// returned list preserves input order and original line numbers.
pub fn parse_lines(text: &str, today: NaiveDate) -> Vec<LineOutcome> {
    let mut outcomes = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if outcomes.len() >= MAX_INPUT_LINES {
            break;
        }

        let (due_date, content) = resolve_date(line, today);
        let result = if content.is_empty() {
            Err(ParseFailure::NoContent)
        } else {
            Ok(ParsedLine { content, due_date })
        };
        outcomes.push(LineOutcome {
            line_no: idx + 1,
            result,
        });
    }

    outcomes
}

fn match_full_date(line: &str, _today: NaiveDate) -> Option<DateMatch> {
    let caps = FULL_DATE.captures(line)?;
    let m = caps.get(0)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(DateMatch {
        date,
        span: m.range(),
    })
}

fn match_month_day(line: &str, today: NaiveDate) -> Option<DateMatch> {
    for caps in MONTH_DAY.captures_iter(line) {
        let m = caps.get(0)?;
        // Reject "11-15" inside a longer digit run (e.g. a phone number).
        if line[m.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        // Current year even if the date already passed; no rollover.
        if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            return Some(DateMatch {
                date,
                span: m.range(),
            });
        }
    }
    None
}

fn match_day_offset(line: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = DAY_OFFSET.captures(line)?;
    let m = caps.get(0)?;
    let days: u64 = caps[1].parse().ok()?;
    if days == 0 {
        return None;
    }
    let date = today.checked_add_days(Days::new(days))?;
    Some(DateMatch {
        date,
        span: m.range(),
    })
}

fn match_week_offset(line: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = WEEK_OFFSET.captures(line)?;
    let m = caps.get(0)?;
    let weeks: u64 = caps[1].parse().ok()?;
    if weeks == 0 {
        return None;
    }
    let date = today.checked_add_days(Days::new(weeks * 7))?;
    Some(DateMatch {
        date,
        span: m.range(),
    })
}

fn match_named_day(line: &str, today: NaiveDate) -> Option<DateMatch> {
    earliest(NAMED_DAYS.iter().filter_map(|&(keyword, offset)| {
        let start = line.find(keyword)?;
        Some(DateMatch {
            date: today + Days::new(offset),
            span: start..start + keyword.len(),
        })
    }))
}

fn match_next_week_weekday(line: &str, today: NaiveDate) -> Option<DateMatch> {
    match_weekday_tokens(line, NEXT_WEEK_PREFIXES, |target| {
        next_week_weekday(today, target)
    })
}

fn match_weekday(line: &str, today: NaiveDate) -> Option<DateMatch> {
    match_weekday_tokens(line, WEEKDAY_PREFIXES, |target| next_weekday(today, target))
}

fn match_weekday_tokens(
    line: &str,
    prefixes: &[&str],
    resolve: impl Fn(u32) -> NaiveDate,
) -> Option<DateMatch> {
    let mut best: Option<DateMatch> = None;
    for prefix in prefixes {
        for &(day_char, target) in WEEKDAY_CHARS {
            let token = format!("{prefix}{day_char}");
            let Some(start) = line.find(&token) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| start < b.span.start) {
                best = Some(DateMatch {
                    date: resolve(target),
                    span: start..start + token.len(),
                });
            }
        }
    }
    best
}

fn earliest(candidates: impl Iterator<Item = DateMatch>) -> Option<DateMatch> {
    candidates.min_by_key(|m| m.span.start)
}

/// Next occurrence of `target` strictly after today; today's own
/// weekday resolves a full week out.
fn next_weekday(today: NaiveDate, target: u32) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let mut ahead = target as i64 - current as i64;
    if ahead <= 0 {
        ahead += 7;
    }
    today + Days::new(ahead as u64)
}

/// Occurrence of `target` in the following calendar week: count to the
/// start of next week, then to the target weekday.
fn next_week_weekday(today: NaiveDate, target: u32) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let ahead = (7 - current) + target;
    today + Days::new(ahead as u64)
}
