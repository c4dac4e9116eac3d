//! Shared grammar machinery: the parser contract, table-header location,
//! multi-line row assembly and the amount-column classifier.

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{Currency, ParseResult, Transaction, amount::find_amounts};
use tracing::debug;

pub use crate::types::{Grammar, ParseContext};

/// Lines scanned for the column header before falling back to headerless mode.
pub const HEADER_SCAN_LINES: usize = 15;

/// Balance deltas closer than this are treated as exact.
const BALANCE_TOLERANCE: f64 = 0.005;

/// Every grammar turns raw statement text into a [`ParseResult`].
///
/// Returning `Err` means "this layout does not apply"; the dispatcher logs it
/// and moves on to the next grammar.
pub trait StatementParser {
    fn grammar(&self) -> Grammar;

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult>;
}

/// Trimmed, non-empty lines.
pub fn statement_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

static HEADER_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdate\b").unwrap());
static HEADER_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(description|details|particulars|narrative|transaction)\b").unwrap()
});
static HEADER_WITHDRAWAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(withdrawals?|debits?|paid\s+out|money\s+out)\b").unwrap()
});
static HEADER_DEPOSIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(deposits?|credits?|paid\s+in|money\s+in)\b").unwrap());
static HEADER_BALANCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbalance\b").unwrap());

/// Located transaction-table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub index: usize,
    pub has_balance: bool,
}

/// Column-name line: a date column plus a description or money column.
pub fn is_header_line(line: &str) -> bool {
    HEADER_DATE.is_match(line)
        && (HEADER_DESCRIPTION.is_match(line)
            || HEADER_WITHDRAWAL.is_match(line)
            || HEADER_DEPOSIT.is_match(line))
        && find_amounts(line).is_empty()
}

pub fn find_table_header(lines: &[&str], scan: usize) -> Option<TableHeader> {
    lines
        .iter()
        .take(scan)
        .position(|line| is_header_line(line))
        .map(|index| TableHeader {
            index,
            has_balance: HEADER_BALANCE.is_match(lines[index]),
        })
}

static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+|\s{2,}").unwrap());

/// Split a row on tabs or runs of two or more spaces.
pub fn split_columns(line: &str) -> Vec<&str> {
    COLUMN_GAP
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

/// Value of a column cell that holds nothing but an amount, optionally
/// followed by a short marker such as `CR`, `DR` or a peso `P`.
pub fn amount_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let tokens = find_amounts(cell);
    let [token] = tokens.as_slice() else {
        return None;
    };
    let outside = format!("{}{}", &cell[..token.start], &cell[token.end..]);
    let outside = outside.trim();
    let marker = outside.len() <= 3 && outside.chars().all(|c| c.is_ascii_alphabetic());
    marker.then_some(token.value)
}

/// True if any phrase occurs in the lowercased line.
pub fn is_sentinel(lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| lower.contains(p))
}

const DEPOSIT_KEYWORDS: &[&str] = &[
    "transfer",
    "interest paid",
    "deposit",
    "credit",
    "payment received",
    "refund",
];

const WITHDRAWAL_KEYWORDS: &[&str] = &[
    "withdrawal",
    "atm",
    "cheque",
    "purchase",
    "payment",
    "debit",
    "fee",
];

fn longest_match(lower: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| k.len())
        .max()
        .unwrap_or(0)
}

/// Description-keyword guess for a lone amount column.
///
/// The more specific (longer) phrase wins, so "payment received" beats
/// "payment" while "credit card payment" stays a withdrawal. Ambiguous
/// descriptions default to withdrawal.
pub fn looks_like_deposit(description: &str) -> bool {
    let lower = description.to_lowercase();
    longest_match(&lower, DEPOSIT_KEYWORDS) > longest_match(&lower, WITHDRAWAL_KEYWORDS)
}

/// What a line with exactly one amount means in a given layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleAmount {
    /// A running balance (layouts with a balance column).
    Balance,
    /// The transaction amount itself.
    Amount,
}

/// Text and money tokens of one line fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineParts {
    pub description: String,
    pub amounts: Vec<f64>,
    /// Trailing `CR` marker after the last amount
    pub credit_marker: bool,
}

impl LineParts {
    pub fn split(fragment: &str) -> Self {
        let tokens = find_amounts(fragment);
        let mut text = String::new();
        let mut cursor = 0;
        for token in &tokens {
            text.push_str(&fragment[cursor..token.start]);
            text.push(' ');
            cursor = token.end;
        }
        let tail = fragment[cursor..].trim();
        let credit_marker = !tokens.is_empty() && tail.eq_ignore_ascii_case("cr");
        if !credit_marker {
            text.push_str(tail);
        }
        Self {
            description: text.split_whitespace().collect::<Vec<_>>().join(" "),
            amounts: tokens.iter().map(|t| t.value).collect(),
            credit_marker,
        }
    }
}

/// A transaction row being assembled, possibly across several lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBuilder {
    pub date: Option<NaiveDate>,
    pub post_date: Option<NaiveDate>,
    pub description: String,
    pub type_code: Option<String>,
    pub paid_out: Option<f64>,
    pub paid_in: Option<f64>,
    pub balance: Option<f64>,
}

impl RowBuilder {
    pub fn start(date: Option<NaiveDate>) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    pub fn push_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }

    /// Feed one line fragment: description text, amounts and a `CR` marker.
    pub fn absorb(&mut self, parts: &LineParts, single: SingleAmount, previous_balance: Option<f64>) {
        self.push_description(&parts.description);
        if parts.credit_marker {
            self.type_code = Some("CR".to_string());
        }
        self.apply_amounts(&parts.amounts, single, previous_balance);
    }

    pub fn has_amount(&self) -> bool {
        self.paid_out.is_some() || self.paid_in.is_some()
    }

    fn is_credit_coded(&self) -> bool {
        self.type_code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("cr") || c.eq_ignore_ascii_case("credit"))
    }

    /// Assign amount tokens to withdrawal / deposit / balance.
    ///
    /// Three or more amounts are read as withdrawal, deposit, balance. With
    /// two, the last is the balance and the first is a deposit when the row is
    /// credit-coded or already has a withdrawal, when the balance moved up by
    /// it, or when the description reads like one. A single amount follows
    /// the layout's [`SingleAmount`] policy unless the row already has an
    /// amount, in which case it is the balance.
    pub fn apply_amounts(&mut self, amounts: &[f64], single: SingleAmount, previous_balance: Option<f64>) {
        match amounts {
            [] => {}
            [only] => {
                if self.has_amount() || single == SingleAmount::Balance {
                    self.balance = Some(*only);
                } else {
                    self.assign(*only, None);
                }
            }
            [first, balance] => {
                self.balance = Some(*balance);
                let by_delta = previous_balance.and_then(|prev| {
                    let magnitude = first.abs();
                    if (prev + magnitude - balance).abs() < BALANCE_TOLERANCE {
                        Some(true)
                    } else if (prev - magnitude - balance).abs() < BALANCE_TOLERANCE {
                        Some(false)
                    } else {
                        None
                    }
                });
                self.assign(*first, by_delta);
            }
            [out, paid_in, .., balance] => {
                if *out != 0.0 {
                    self.paid_out = Some(out.abs());
                }
                if *paid_in != 0.0 {
                    self.paid_in = Some(paid_in.abs());
                }
                self.balance = Some(*balance);
            }
        }
    }

    fn assign(&mut self, value: f64, by_delta: Option<bool>) {
        let deposit = if self.is_credit_coded() || self.paid_out.is_some() {
            true
        } else if let Some(up) = by_delta {
            up
        } else if value < 0.0 {
            false
        } else {
            looks_like_deposit(&self.description)
        };
        debug!(value, deposit, description = %self.description, "classified amount column");
        if deposit {
            self.paid_in = Some(value.abs());
        } else {
            self.paid_out = Some(value.abs());
        }
    }

    /// Deposits positive, withdrawals negative; `None` if no amount was seen.
    pub fn signed_amount(&self) -> Option<f64> {
        if !self.has_amount() {
            return None;
        }
        Some(self.paid_in.unwrap_or(0.0) - self.paid_out.unwrap_or(0.0))
    }

    pub fn into_transaction(self, currency: Currency) -> Option<Transaction> {
        let amount = self.signed_amount()?;
        let mut txn = Transaction::new(self.date, self.description, amount, currency)
            .with_balance(self.balance)
            .with_post_date(self.post_date);
        txn.type_code = self.type_code;
        Some(txn)
    }
}
