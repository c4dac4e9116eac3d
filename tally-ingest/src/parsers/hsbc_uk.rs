//! HSBC UK personal bank account statement parser (text)
//!
//! Two layouts are in circulation.
//!
//! Standard, one field per OCR line with a type code:
//!   Date   Payment type and details   Paid out   Paid in   Balance
//!   03 Jun 24
//!   BP
//!   UBER TRIP
//!   28.90   471.10
//!
//! Simple table ("Details of your account activity"):
//!   15 Jun   Costa Coffee
//!   7.00   464.10

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    AccountDetails, Currency, Issuer, ParseResult, StatementSummary, Transaction,
    amount::find_amounts, date::leading_date, date::parse_day_month, detect_currency_or,
};
use tracing::debug;

use crate::grammar::{
    Grammar, LineParts, ParseContext, RowBuilder, SingleAmount, StatementParser, is_sentinel,
    statement_lines,
};
use crate::types::first_year;

pub const BANK_NAME: &str = "HSBC UK";

/// HSBC UK transaction type codes and the label each one implies.
const TYPE_CODES: &[(&str, &str)] = &[
    ("BP", "Bill Payment"),
    ("CR", "Credit/Deposit"),
    ("DD", "Direct Debit"),
    ("SO", "Standing Order"),
    ("CHQ", "Cheque"),
    ("ATM", "ATM Withdrawal"),
    ("TFR", "Transfer"),
    ("FEE", "Fee"),
    ("INT", "Interest"),
    ("BAC", "BACS Payment"),
    ("FPI", "Faster Payment"),
    ("Debit", "Debit"),
    ("Credit", "Credit"),
];

/// Description keywords for rows without a type code.
const DESCRIPTION_LABELS: &[(&[&str], &str)] = &[
    (&["salary", "wages"], "Income"),
    (&["transfer"], "Transfer"),
    (&["deposit"], "Deposit"),
    (&["rent"], "Rent"),
    (&["groceries", "supermarket"], "Groceries"),
    (&["restaurant", "cafe", "coffee"], "Dining"),
    (&["gas", "electric", "water"], "Utilities"),
    (&["uber", "taxi"], "Transport"),
];

const STANDARD_STOP: &[&str] = &[
    "balance carried forward",
    "continued on next page",
    "correspondence:",
    "statement page",
    "centenary square",
];

const SIMPLE_STOP: &[&str] = &[
    "correspondence:",
    "statement page",
    "centenary square",
    "end of statement",
    "your closing balance",
];

const STANDARD_SKIP: &[&str] = &["balance brought forward", "balance b/f", "closing balance"];

static ADDRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s+(High Street|Centenary Square)").unwrap());

static PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s+([A-Za-z]+)\s+to\s+(\d{1,2})\s+([A-Za-z]+)\s+(\d{4})").unwrap()
});
static COMPACT_PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)From[A-Za-z]{3}(\d{1,2}),(\d{4})to[A-Za-z]{3}(\d{1,2}),(\d{4})").unwrap()
});
static BALANCE_ON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\s+([A-Za-z]+)\s+(\d{1,2}),\s+(\d{4})").unwrap());

static IBAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^GB\d{2}[A-Z]{4}\d+$").unwrap());
static BIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{4}GB[A-Z0-9]+$").unwrap());
static SORT_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2}-\d{2}-\d{2})").unwrap());
static ACCOUNT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)account number:\s*(\d{8})").unwrap());
static EIGHT_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{8})\b").unwrap());

static SIMPLE_HEADER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(withdrawals|deposits|balance)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Standard,
    SimpleTable,
}

pub struct HsbcUkParser;

impl StatementParser for HsbcUkParser {
    fn grammar(&self) -> Grammar {
        Grammar::HsbcUk
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_hsbc_uk_text(text, ctx)
    }
}

pub fn detect_layout(lines: &[&str]) -> Layout {
    let simple = lines.iter().any(|line| {
        let lower = line.to_lowercase();
        (lower.contains("withdrawal") && lower.contains("deposit"))
            || line.contains("Details of your account activity")
    });
    if simple {
        Layout::SimpleTable
    } else {
        Layout::Standard
    }
}

/// Statement year from the period line, else the "opening balance on"
/// line, else the first `20xx` in the text.
pub fn statement_year(lines: &[&str], text: &str) -> Option<i32> {
    let from_period = lines.iter().find_map(|line| {
        if let Some(caps) = PERIOD.captures(line) {
            return caps[5].parse().ok();
        }
        COMPACT_PERIOD
            .captures(line)
            .and_then(|caps| caps[4].parse().ok())
    });
    from_period
        .or_else(|| {
            lines
                .iter()
                .find_map(|line| BALANCE_ON.captures(line).and_then(|c| c[3].parse().ok()))
        })
        .or_else(|| first_year(text))
}

fn first_amount(line: &str) -> Option<f64> {
    find_amounts(line).first().map(|t| t.value)
}

/// The "Your Account Summary" box; later occurrences overwrite earlier ones.
pub fn account_summary(lines: &[&str]) -> StatementSummary {
    let mut summary = StatementSummary::default();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        let next = lines.get(i + 1).copied().unwrap_or("");
        let here_then_next = || first_amount(line).or_else(|| first_amount(next));
        let next_then_here = || first_amount(next).or_else(|| first_amount(line));

        let (slot, value) = if lower.contains("opening balance") {
            (&mut summary.opening_balance, here_then_next())
        } else if lower.contains("total deposits into your account") {
            (&mut summary.total_deposits, here_then_next())
        } else if lower.contains("total withdrawals from your account") {
            (&mut summary.total_withdrawals, here_then_next())
        } else if lower.contains("closing balance") {
            (&mut summary.closing_balance, here_then_next())
        } else if lower.contains("payments in") {
            (&mut summary.total_deposits, next_then_here())
        } else if lower.contains("payments out") {
            (&mut summary.total_withdrawals, next_then_here())
        } else {
            continue;
        };
        if value.is_some() {
            *slot = value;
        }
    }
    summary
}

pub fn account_details(lines: &[&str]) -> AccountDetails {
    let mut details = AccountDetails::default();
    for line in lines {
        if IBAN.is_match(line) {
            details.iban = Some(line.to_string());
        }
        if BIC.is_match(line) {
            details.bic = Some(line.to_string());
        }
        if let Some(caps) = SORT_CODE.captures(line) {
            details.sort_code = Some(caps[1].to_string());
        }
        if let Some(caps) = ACCOUNT_NUMBER.captures(line) {
            details.account_number = Some(caps[1].to_string());
        } else if details.account_number.is_none() {
            if let Some(caps) = EIGHT_DIGITS.captures(line) {
                details.account_number = Some(caps[1].to_string());
            }
        }
    }
    details
}

/// Label for a type code, else from description keywords.
pub fn raw_category(type_code: Option<&str>, description: &str) -> &'static str {
    if let Some(label) = type_code.and_then(|code| {
        TYPE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }) {
        return label;
    }
    let lower = description.to_lowercase();
    DESCRIPTION_LABELS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, label)| *label)
        .unwrap_or("Other")
}

fn type_code(word: &str) -> Option<&'static str> {
    TYPE_CODES
        .iter()
        .find(|(code, _)| *code == word)
        .map(|(code, _)| *code)
}

fn clean_description(description: &str) -> String {
    description
        .replace('|', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A `15 Jun` / `15 Jun 24` date opening a row, with the rest of the line.
fn dated_line(line: &str, year: i32, require_year: bool) -> Option<(NaiveDate, &str)> {
    let lead = leading_date(line)?;
    let has_year = lead.token.ends_with(|c: char| c.is_ascii_digit());
    if require_year && !has_year {
        return None;
    }
    Some((parse_day_month(lead.token, year)?, lead.rest))
}

fn finish(row: RowBuilder, currency: Currency) -> Option<Transaction> {
    let code = row.type_code.clone();
    let description = clean_description(&row.description);
    let balance = row.balance;
    let amount = match row.signed_amount() {
        Some(amount) => amount,
        // balance-only rows are kept with a zero amount
        None if balance.is_some() => 0.0,
        None => return None,
    };
    let label = raw_category(code.as_deref(), &description);
    let mut txn = Transaction::new(row.date, description, amount, currency)
        .with_balance(balance)
        .with_raw_category(label);
    txn.type_code = code;
    Some(txn)
}

fn standard_start(lines: &[&str]) -> Option<usize> {
    let header = lines.iter().position(|line| {
        let lower = line.to_lowercase();
        (lower.contains("paid out") && lower.contains("paid in"))
            || (lower.contains("money out") && lower.contains("money in"))
            || (lower.contains("payment type") && lower.contains("details"))
            || lower == "transactions"
    });
    let header = header.or_else(|| {
        lines
            .iter()
            .position(|line| line.to_lowercase().contains("transaction"))
    })?;

    let mut start = header + 1;
    while let Some(line) = lines.get(start) {
        let lower = line.to_lowercase();
        let is_header = ["description", "continued", "details", "money", "balance"]
            .iter()
            .any(|w| lower.contains(w))
            || lower == "date";
        if !is_header {
            break;
        }
        start += 1;
    }
    Some(start)
}

fn parse_standard(
    lines: &[&str],
    year: i32,
    opening: Option<f64>,
    currency: Currency,
) -> Vec<Transaction> {
    let Some(start) = standard_start(lines) else {
        debug!("HSBC UK: no transaction section found");
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut running = opening;
    let mut current: Option<RowBuilder> = None;
    let mut flush = |row: Option<RowBuilder>, running: &mut Option<f64>| {
        let Some(row) = row else { return };
        if row.balance.is_some() {
            *running = row.balance;
        }
        out.extend(finish(row, currency));
    };

    for line in &lines[start..] {
        let lower = line.to_lowercase();
        if is_sentinel(&lower, STANDARD_STOP) || ADDRESS_LINE.is_match(line) {
            break;
        }
        if is_sentinel(&lower, STANDARD_SKIP) {
            continue;
        }

        if let Some((date, rest)) = dated_line(line, year, true) {
            flush(current.take(), &mut running);
            let mut row = RowBuilder::start(Some(date));
            let rest = match rest.split_once(' ') {
                Some((word, tail)) if type_code(word).is_some() => {
                    row.type_code = type_code(word).map(str::to_string);
                    tail
                }
                _ if type_code(rest).is_some() => {
                    row.type_code = type_code(rest).map(str::to_string);
                    ""
                }
                _ => rest,
            };
            row.absorb(&LineParts::split(rest), SingleAmount::Amount, running);
            current = Some(row);
            continue;
        }

        let Some(row) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if row.type_code.is_none() {
            if let Some(code) = type_code(trimmed) {
                row.type_code = Some(code.to_string());
                continue;
            }
        }
        let parts = LineParts::split(trimmed);
        if !parts.amounts.is_empty() {
            row.absorb(&parts, SingleAmount::Amount, running);
        } else if trimmed.chars().count() > 1
            && !["continued", "details", "out", "in", "balance"].contains(&lower.as_str())
        {
            row.push_description(trimmed);
        }
    }
    flush(current.take(), &mut running);
    out
}

fn parse_simple_table(
    lines: &[&str],
    year: i32,
    opening: Option<f64>,
    currency: Currency,
) -> Vec<Transaction> {
    let Some(header) = lines.iter().position(|line| {
        let lower = line.to_lowercase();
        (lower.contains("date") && lower.contains("description"))
            || lower.contains("details of your account activity")
    }) else {
        debug!("HSBC UK: no simple table header found");
        return Vec::new();
    };

    let mut start = header + 1;
    while let Some(line) = lines.get(start) {
        let lower = line.to_lowercase();
        let is_header = ["withdrawal", "deposit", "balance"]
            .iter()
            .any(|w| lower.contains(w))
            || lower == "date"
            || lower == "description";
        if !is_header {
            break;
        }
        start += 1;
    }

    let mut out = Vec::new();
    let mut running = opening;
    let mut current: Option<RowBuilder> = None;
    let mut flush = |row: Option<RowBuilder>, running: &mut Option<f64>| {
        let Some(row) = row else { return };
        if row.balance.is_some() {
            *running = row.balance;
        }
        out.extend(finish(row, currency));
    };

    for line in &lines[start..] {
        let lower = line.to_lowercase();
        if is_sentinel(&lower, SIMPLE_STOP) {
            break;
        }

        if let Some((date, rest)) = dated_line(line, year, false) {
            flush(current.take(), &mut running);
            let mut row = RowBuilder::start(Some(date));
            row.absorb(&LineParts::split(rest), SingleAmount::Balance, running);
            current = Some(row);
            continue;
        }

        let Some(row) = current.as_mut() else {
            continue;
        };
        let parts = LineParts::split(line);
        if !parts.amounts.is_empty() {
            row.absorb(&parts, SingleAmount::Balance, running);
        } else if !SIMPLE_HEADER_WORD.is_match(line) {
            row.push_description(line);
        }
    }
    flush(current.take(), &mut running);
    out
}

/// Parse extracted HSBC UK statement text.
pub fn parse_hsbc_uk_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let lines = statement_lines(text);
    let layout = detect_layout(&lines);
    let year = ctx
        .statement_year
        .or_else(|| statement_year(&lines, text))
        .unwrap_or_else(|| ctx.resolve_year(text));
    let currency = detect_currency_or(text, Currency::Gbp);

    let mut summary = account_summary(&lines);
    summary.statement_year = Some(year);
    summary.account = account_details(&lines);
    debug!(?layout, year, "HSBC UK layout");

    let transactions = match layout {
        Layout::Standard => parse_standard(&lines, year, summary.opening_balance, currency),
        Layout::SimpleTable => parse_simple_table(&lines, year, summary.opening_balance, currency),
    };

    let mut result = ParseResult::new(Issuer::Hsbc, BANK_NAME, text);
    result.currency = currency;
    result.summary = summary;
    result.transactions = transactions;
    Ok(result)
}
