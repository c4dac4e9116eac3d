//! Date normalization for OCR'd statement text.
//!
//! Supported notations (tried in this order):
//!   2024-03-05, 5 Mar 2024, Mar 5, 2024   (native)
//!   2024-23-01                            (ISO with day/month transposed)
//!   3/5                                   (M/D, reference year)
//!   03/05/2024                            (M/D/YYYY)
//!   05-03-2024                            (D-M-YYYY)
//!   2024/5/23, 2024.23.5                  (Y-?-?, adaptive swap)
//!   03.05.2024                            (dots rewritten to slashes)

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d)(st|nd|rd|th)\b").unwrap());
static ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").unwrap());
static MDY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DMY_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap());
static YEAR_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").unwrap());
static DOT_BETWEEN_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\.(\d)").unwrap());

static DAY_FIRST_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{2}|\d{4})$").unwrap());
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[\s\-]+([A-Za-z]{3,9})\.?,?(?:[\s\-]+(\d{4}|\d{2}))?$").unwrap()
});

/// Leading date tokens, longest notations first.
static LEADING_DATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(\d{4}-\d{1,2}-\d{1,2})(?:\s+|$)",
        r"^(\d{1,2}[/\-.]\d{1,2}[/\-.](?:\d{4}|\d{2}))(?:\s+|$)",
        r"^(\d{1,2}/\d{1,2})(?:\s+|$)",
        r"^(\d{1,2}[\s\-][A-Za-z]{3,9}\.?,?[\s\-](?:\d{4}|\d{2}))(?:\s+|$)",
        r"^(\d{1,2}[\s\-][A-Za-z]{3,9}\.?)(?:\s+|$)",
        r"^([A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4})(?:\s+|$)",
        r"^([A-Za-z]{3,9}\.?\s+\d{1,2})(?:\s+|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const NATIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %b, %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%m/%d/%Y",
];

/// Parse a date-like string, resolving year-less notations against the
/// current year.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    parse_date_with_year(input, Local::now().year())
}

/// Parse a date-like string; `reference_year` fills in `M/D` notations.
pub fn parse_date_with_year(input: &str, reference_year: i32) -> Option<NaiveDate> {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return None;
    }
    resolve(&cleaned, reference_year).or_else(|| {
        let slashed = DOT_BETWEEN_DIGITS.replace_all(&cleaned, "$1/$2");
        let slashed = DOT_BETWEEN_DIGITS.replace_all(&slashed, "$1/$2");
        if slashed == cleaned {
            None
        } else {
            resolve(&slashed, reference_year)
        }
    })
}

fn clean(input: &str) -> String {
    let no_ordinals = ORDINAL.replace_all(input.trim(), "$1");
    no_ordinals
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([',', '.'])
        .to_string()
}

fn resolve(s: &str, reference_year: i32) -> Option<NaiveDate> {
    native(s)
        .or_else(|| {
            let (y, a, b) = three_numbers(&ISO, s)?;
            ymd(y, a, b).or_else(|| ymd(y, b, a))
        })
        .or_else(|| {
            let caps = MONTH_DAY.captures(s)?;
            ymd(reference_year, caps[1].parse().ok()?, caps[2].parse().ok()?)
        })
        .or_else(|| {
            let (m, d, y) = three_numbers(&MDY, s)?;
            ymd(y as i32, m, d)
        })
        .or_else(|| {
            let (d, m, y) = three_numbers(&DMY_DASH, s)?;
            ymd(y as i32, m, d)
        })
        .or_else(|| {
            let (y, a, b) = three_numbers(&YEAR_FIRST, s)?;
            if a > 12 { ymd(y, b, a) } else { ymd(y, a, b) }
        })
}

fn native(s: &str) -> Option<NaiveDate> {
    NATIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn three_numbers<T: std::str::FromStr>(re: &Regex, s: &str) -> Option<(T, u32, u32)> {
    let caps = re.captures(s)?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Month number from an English month name or its 3-letter prefix.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    MONTHS
        .iter()
        .position(|m| m.starts_with(lower.as_str()))
        .map(|i| i as u32 + 1)
}

/// Expand a two-digit year (`24` -> 2024, `87` -> 1987).
pub fn expand_year(year: i32) -> i32 {
    match year {
        0..=50 => 2000 + year,
        51..=99 => 1900 + year,
        _ => year,
    }
}

/// Parse `15 Jun`, `15-Jun-24` or `15 June 2024`; `year` is used when the
/// token carries none.
pub fn parse_day_month(token: &str, year: i32) -> Option<NaiveDate> {
    let caps = DAY_MONTH.captures(token.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_name(&caps[2])?;
    let year = match caps.get(3) {
        Some(y) => expand_year(y.as_str().parse().ok()?),
        None => year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse day-first numeric dates: `15/06/24`, `15-06-2024`, `15.06.2024`.
pub fn parse_day_first(token: &str) -> Option<NaiveDate> {
    let caps = DAY_FIRST_NUMERIC.captures(token.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year = expand_year(caps[3].parse().ok()?);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// A date token found at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingDate<'a> {
    pub token: &'a str,
    pub rest: &'a str,
}

/// Split a leading date-looking token off `line`.
///
/// Only the shape is checked here; resolving the token is up to the caller
/// since day-first vs month-first depends on the issuer.
pub fn leading_date(line: &str) -> Option<LeadingDate<'_>> {
    let line = line.trim_start();
    LEADING_DATE.iter().find_map(|re| {
        let caps = re.captures(line)?;
        let token = caps.get(1)?;
        let whole = caps.get(0)?;
        if token.as_str().chars().any(|c| c.is_ascii_alphabetic()) {
            let word = token
                .as_str()
                .split(|c: char| !c.is_ascii_alphabetic())
                .find(|w| !w.is_empty())?;
            month_from_name(word)?;
        }
        Some(LeadingDate {
            token: token.as_str(),
            rest: line[whole.end()..].trim(),
        })
    })
}

/// Resolve a leading-date token: day-month names first, then the
/// month-first numeric reading, then day-first numerics.
pub fn resolve_token(token: &str, reference_year: i32) -> Option<NaiveDate> {
    if let Some(date) = parse_day_month(token, reference_year) {
        return Some(date);
    }
    let starts_with_month = token.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let has_year = token
        .split(|c: char| !c.is_ascii_digit())
        .any(|part| part.len() == 4);
    if starts_with_month && !has_year {
        let with_year = format!("{} {reference_year}", token.trim_end_matches(','));
        return parse_date_with_year(&with_year, reference_year);
    }
    parse_date_with_year(token, reference_year).or_else(|| parse_day_first(token))
}
