//! BDO (Philippines) savings/checking statement parser (text)
//!
//! Rows start with a long-form date and are column separated:
//!   June 3, 2024    ATM WITHDRAWAL      5,000.00                 45,210.55
//!   June 5, 2024    FUND TRANSFER                    12,000.00   57,210.55

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{Issuer, ParseResult, Transaction, date::parse_date_with_year, detect_currency};
use tracing::debug;

use crate::grammar::{
    Grammar, HEADER_SCAN_LINES, ParseContext, RowBuilder, SingleAmount, StatementParser,
    amount_cell, find_table_header, split_columns, statement_lines,
};
use crate::summary::extract_summary;

pub const BANK_NAME: &str = "BDO Philippines";

/// Metadata lines: addresses, contact blocks, summary labels.
static IGNORE: Lazy<Regex> = Lazy::new(|| {
    let keywords = [
        "previous", "account", "statement", r"cheque no", r"page \d+ of \d+",
        "customer service", "contact us", "important information",
        "transactions since last statement", r"www\.", r"\.com", r"\.net", r"\.org",
        "total deposits", "total withdrawals", "interest paid", "fees charged",
        "summary of account", "account summary", "card number", "member number",
        "sort code", "swift code", "bic code", "thank you for banking", "visit us at",
        "po box", r"p\.o\. box", "attn:", r"inc\.", "llc", r"ltd\.", "transaction id",
        "reference no", "authorization code", "processed on", "credit limit",
        "credit line", "cash limit", "interest rate", "available credit",
        "closing balance", "payments in", "payments out", "total", "account number",
        "for", "your branch", "we find ways", "tel", "hours a day",
        "contact us by phone", r"bdo\.com", "laguna", "philippines",
    ];
    Regex::new(&format!(r"(?i)\b(?:{})(?:\b|$)", keywords.join("|"))).unwrap()
});

static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:January|February|March|April|May|June|July|August|September|",
        r"October|November|December)\s+\d{1,2},?\s+\d{4}"
    ))
    .unwrap()
});

pub struct BdoParser;

impl StatementParser for BdoParser {
    fn grammar(&self) -> Grammar {
        Grammar::Bdo
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_bdo_text(text, ctx)
    }
}

/// One dated row split into description and amount cells.
struct BdoRow {
    date: NaiveDate,
    description: String,
    amounts: Vec<f64>,
}

fn split_row(line: &str, year: i32) -> Option<BdoRow> {
    let m = LONG_DATE.find(line)?;
    let date = parse_date_with_year(m.as_str(), year)?;
    let mut description = None;
    let mut amounts = Vec::new();
    for cell in split_columns(&line[m.end()..]) {
        if let Some(value) = amount_cell(cell) {
            amounts.push(value);
        } else if description.is_none() {
            description = Some(cell.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }
    Some(BdoRow {
        date,
        description: description.unwrap_or_default(),
        amounts,
    })
}

/// Signed amount of a row.
///
/// Fund transfers and deposits are credits, withdrawals debits. Anything else
/// goes through the shared column classifier with the running balance.
fn signed_amount(row: &BdoRow, running: Option<f64>) -> Option<f64> {
    let lower = row.description.to_lowercase();
    let (withdrawal, deposit) = match row.amounts.as_slice() {
        [first, _balance] if lower.contains("withdrawal") => (Some(*first), None),
        [first, _balance] => (None, Some(*first)),
        [w, d, ..] => (Some(*w), Some(*d)),
        _ => (None, None),
    };

    if lower.contains("fund transfer") || lower.contains("deposit") {
        deposit.map(f64::abs)
    } else if lower.contains("withdrawal") {
        withdrawal.map(|w| -w.abs())
    } else {
        let mut builder = RowBuilder::start(Some(row.date));
        builder.push_description(&row.description);
        builder.apply_amounts(&row.amounts, SingleAmount::Balance, running);
        builder.signed_amount()
    }
}

/// Parse extracted BDO statement text.
pub fn parse_bdo_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let lines = statement_lines(text);
    let year = ctx.resolve_year(text);
    let currency = detect_currency(text);

    let mut result = ParseResult::new(Issuer::Bdo, BANK_NAME, text);
    result.currency = currency;
    result.summary = extract_summary(&lines);
    result.summary.statement_year = Some(year);

    let start = find_table_header(&lines, HEADER_SCAN_LINES).map_or(0, |h| h.index + 1);
    let mut running = result.summary.opening_balance;
    let mut ignored = 0usize;

    for line in &lines[start..] {
        if IGNORE.is_match(line) {
            ignored += 1;
            continue;
        }
        let Some(row) = split_row(line, year) else {
            continue;
        };
        if row.description.chars().count() < 2 {
            debug!(line, "skipped BDO row without description");
            continue;
        }
        let balance = if row.amounts.len() >= 2 {
            row.amounts.last().copied()
        } else {
            None
        };
        let amount = signed_amount(&row, running);
        if balance.is_some() {
            running = balance;
        }
        let Some(amount) = amount.filter(|a| *a != 0.0) else {
            debug!(line, "skipped BDO row with zero or missing amount");
            continue;
        };
        result.transactions.push(
            Transaction::new(Some(row.date), row.description, amount, currency).with_balance(balance),
        );
    }

    debug!(ignored, parsed = result.transactions.len(), "BDO parse finished");
    result.sort_by_date();
    Ok(result)
}
