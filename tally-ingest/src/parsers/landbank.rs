//! Landbank (Land Bank of the Philippines) statement parser (text)
//!
//! One row per line, day-first dates, the last amount is the balance:
//!   05/03/24  ATM WITHDRAWAL MAKATI      2,000.00   18,000.00
//!   07/03/24  TRANSFER FROM BANKNET      5,000.00   23,000.00

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    Currency, Issuer, ParseResult, StatementSummary, Transaction,
    amount::find_amounts,
    date::{parse_day_first, parse_day_month},
    parse_amount,
};
use tracing::debug;

use crate::grammar::{Grammar, ParseContext, StatementParser, statement_lines};

pub const BANK_NAME: &str = "Landbank";

const UNKNOWN_DESCRIPTION: &str = "UNKNOWN TRANSACTION";

static ROW_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}/\d{2}/\d{2,4}|\d{2}-\d{2}-\d{2,4}|\d{2}\s+[A-Za-z]{3}\s+\d{2,4})").unwrap()
});

static EXCLUDE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)page\s+\d+\s+of\s+\d+",
        r"(?i)land\s*bank\s*of\s*the\s*philippines",
        r"(?i)statement\s+of\s+account",
        r"(?i)account\s+number",
        r"(?i)branch:",
        r"(?i)date\s+printed",
        r"(?i)transaction\s+history",
        r"(?i)currency:\s*php",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// The only descriptions that bring money in.
static INCOMING: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)transfer from banknet",
        r"(?i)visa transfer from",
        r"(?i)cash-?in from pay\s?&?\s?go",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static OPENING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:opening|previous|beginning)\s+balance\s*:?\s*([\d,]+\.\d{2})").unwrap()
});
static CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:closing|ending)\s+balance\s*:?\s*([\d,]+\.\d{2})").unwrap());

pub struct LandbankParser;

impl StatementParser for LandbankParser {
    fn grammar(&self) -> Grammar {
        Grammar::Landbank
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_landbank_text(text, ctx)
    }
}

fn row_date(token: &str, year: i32) -> Option<NaiveDate> {
    parse_day_first(token).or_else(|| parse_day_month(token, year))
}

fn is_incoming(description: &str) -> bool {
    INCOMING.iter().any(|re| re.is_match(description))
}

/// Declared balances plus totals summed from the parsed rows.
fn summary_for(text: &str, transactions: &[Transaction]) -> StatementSummary {
    let capture = |re: &Regex| re.captures(text).and_then(|caps| parse_amount(&caps[1]));
    let (credits, debits) = transactions
        .iter()
        .fold((0.0, 0.0), |(c, d), t| {
            if t.amount > 0.0 {
                (c + t.amount, d)
            } else {
                (c, d + t.amount.abs())
            }
        });
    StatementSummary {
        opening_balance: capture(&*OPENING),
        closing_balance: capture(&*CLOSING),
        total_deposits: Some(credits),
        total_withdrawals: Some(debits),
        ..StatementSummary::default()
    }
}

/// Parse extracted Landbank statement text.
pub fn parse_landbank_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let year = ctx.resolve_year(text);
    let currency = Currency::Php;
    let mut transactions = Vec::new();

    for line in statement_lines(text) {
        if EXCLUDE.iter().any(|re| re.is_match(line)) {
            continue;
        }
        let Some(m) = ROW_DATE.find(line) else {
            continue;
        };
        let rest = &line[m.end()..];
        let tokens = find_amounts(rest);
        let (amount, balance) = match tokens.as_slice() {
            [] => continue,
            [only] => (only.value, None),
            [.., amount, balance] => (amount.value, Some(balance.value)),
        };

        let mut description = String::new();
        let mut cursor = 0;
        for token in &tokens {
            description.push_str(&rest[cursor..token.start]);
            description.push(' ');
            cursor = token.end;
        }
        description.push_str(&rest[cursor..]);
        let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
        let description = if description.is_empty() {
            UNKNOWN_DESCRIPTION.to_string()
        } else {
            description
        };

        let signed = if is_incoming(&description) {
            amount.abs()
        } else {
            -amount.abs()
        };
        let date = row_date(m.as_str(), year);
        if date.is_none() {
            debug!(token = m.as_str(), "Landbank: unreadable date");
        }
        transactions.push(
            Transaction::new(date, description, signed, currency).with_balance(balance),
        );
    }

    let mut result = ParseResult::new(Issuer::Landbank, BANK_NAME, text);
    result.currency = currency;
    result.summary = summary_for(text, &transactions);
    result.summary.statement_year = Some(year);
    result.transactions = transactions;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
LAND BANK OF THE PHILIPPINES
Statement of Account
Opening Balance: 20,000.00
05/03/24  ATM WITHDRAWAL MAKATI      2,000.00   18,000.00
07/03/24  TRANSFER FROM BANKNET      5,000.00   23,000.00
09/03/24  CASH-IN FROM PAY&GO          500.00   23,500.00
10/03/24  SERVICE FEE                   50.00   23,450.00
12 Mar 24  3,000.00
Closing Balance: 20,450.00
Page 1 of 1
"#;

    #[test]
    fn test_landbank_rows_and_signs() {
        let result = parse_landbank_text(SAMPLE, &ParseContext::default()).unwrap();
        let rows: Vec<(&str, f64)> = result
            .transactions
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("ATM WITHDRAWAL MAKATI", -2000.0),
                ("TRANSFER FROM BANKNET", 5000.0),
                ("CASH-IN FROM PAY&GO", 500.0),
                ("SERVICE FEE", -50.0),
                ("UNKNOWN TRANSACTION", -3000.0),
            ]
        );
        assert_eq!(result.transactions[0].date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(result.transactions[0].balance, Some(18000.0));
        assert_eq!(result.transactions[4].balance, None);
    }

    #[test]
    fn test_landbank_summary_totals_are_computed() {
        let result = parse_landbank_text(SAMPLE, &ParseContext::default()).unwrap();
        assert_eq!(result.summary.opening_balance, Some(20000.0));
        assert_eq!(result.summary.closing_balance, Some(20450.0));
        assert_eq!(result.summary.total_deposits, Some(5500.0));
        assert_eq!(result.summary.total_withdrawals, Some(5050.0));
    }
}
