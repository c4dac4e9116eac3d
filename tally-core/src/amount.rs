//! Locale-ambiguous money parsing.
//!
//! OCR output mixes `1,234.56`, `1.234,56`, `1 234.56`, `₱1,234.56`,
//! `1,234.56 P` and `(45.00)` freely, sometimes within one statement.

use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s+(\d)").unwrap());

/// Money-looking token: optional sign/parens/symbol, two decimals.
static AMOUNT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\(?(?:-\s?)?(?:[$€£¥₹₽₱₪]\s?)?",
        r"(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}",
        r"\)?"
    ))
    .unwrap()
});

/// An amount found inside a line of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountToken {
    pub value: f64,
    pub start: usize,
    pub end: usize,
}

/// Parse a money string into a signed number.
///
/// Separator rules: when both `,` and `.` appear the right-most one is the
/// decimal separator; commas alone are a decimal comma only for a single
/// trailing two-digit group; several periods are thousands separators.
/// Parenthesised values and a leading or trailing minus are negative.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let first_digit = trimmed.find(|c: char| c.is_ascii_digit())?;
    let last_digit = trimmed.rfind(|c: char| c.is_ascii_digit())?;

    let negative = trimmed[..first_digit].contains('-')
        || trimmed[last_digit..].contains('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let unspaced = DIGIT_SPACING.replace_all(trimmed, "$1$2");
    let unspaced = DIGIT_SPACING.replace_all(&unspaced, "$1$2");
    // Currency glyphs, codes and a trailing peso `P` all fall out here.
    let digits: String = unspaced
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = normalize_separators(&digits);
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

fn normalize_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() == 2 && parts[1].len() == 2 {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    }
}

/// Every two-decimal money token in `line`, left to right.
///
/// Tokens glued to further digits or dots (dates such as `15.06.2024`,
/// reference numbers) are ignored.
pub fn find_amounts(line: &str) -> Vec<AmountToken> {
    let bytes = line.as_bytes();
    AMOUNT_TOKEN
        .find_iter(line)
        .filter(|m| {
            let before = m.start().checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(m.end()).copied();
            let glued_before = matches!(before, Some(b) if b.is_ascii_digit() || b == b'.' || b == b',');
            let glued_after = matches!(after, Some(b) if b.is_ascii_digit() || b == b'.')
                || (after == Some(b',')
                    && bytes.get(m.end() + 1).is_some_and(|b| b.is_ascii_digit()));
            !glued_before && !glued_after
        })
        .filter_map(|m| {
            parse_amount(m.as_str()).map(|value| AmountToken {
                value,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

/// Values of [`find_amounts`], without positions.
pub fn amounts_in(line: &str) -> Vec<f64> {
    find_amounts(line).into_iter().map(|t| t.value).collect()
}
