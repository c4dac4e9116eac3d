//! Metrobank savings statement parser (text)
//!
//! Column-split rows (two or more spaces between cells):
//!   DATE      DESCRIPTION            WITHDRAWAL    DEPOSIT      BALANCE
//!   03/02     WATER BILL             1,250.00      -            48,750.00
//!   03/05     CHECK DEPOSIT          -             10,000.00    58,750.00

use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    Currency, Issuer, ParseResult, StatementSummary, Transaction,
    date::{expand_year, parse_day_month},
    parse_amount,
};
use tracing::{debug, warn};

use crate::grammar::{
    Grammar, ParseContext, StatementParser, amount_cell, split_columns, statement_lines,
};

pub const BANK_NAME: &str = "Metrobank";

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?").unwrap());
static NAMED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\s+[A-Za-z]{3,9}(?:\s+\d{2,4})?").unwrap());

static CREDIT_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)check|deposit|payment").unwrap());
static DEBIT_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)water bill|rent bill|payroll|main office wholesale|debit transaction").unwrap()
});
static PREVIOUS_BALANCE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)previous balance").unwrap());

static OPENING: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)previous\s+balance[:\s]*([-\d,().]+)",
        r"(?i)balance\s+brought\s+forward[:\s]*([-\d,().]+)",
        r"(?i)opening[:\s]*balance[:\s]*([-\d,().]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)closing\s+balance[:\s]*([-\d,().]+)").unwrap());

pub struct MetrobankParser;

impl StatementParser for MetrobankParser {
    fn grammar(&self) -> Grammar {
        Grammar::Metrobank
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_metrobank_text(text, ctx)
    }
}

/// Leading date of the first cell (month-first numerics), plus whatever text
/// shares the cell with it.
fn leading_cell_date(cell: &str, year: i32) -> Option<(NaiveDate, &str)> {
    if let Some(caps) = NUMERIC_DATE.captures(cell) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year = match caps.get(3) {
            Some(y) => expand_year(y.as_str().parse().ok()?),
            None => year,
        };
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some((date, cell[caps.get(0)?.end()..].trim()));
    }
    let m = NAMED_DATE.find(cell)?;
    Some((parse_day_month(m.as_str(), year)?, cell[m.end()..].trim()))
}

/// A cell's value; `-` and blanks count as zero.
fn cell_value(cell: Option<&&str>) -> f64 {
    match cell {
        Some(c) if c.trim() != "-" => amount_cell(c).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Opening/closing figures; parenthesised values are negative.
pub fn balances(text: &str) -> StatementSummary {
    let capture = |re: &Regex| re.captures(text).and_then(|caps| parse_amount(&caps[1]));
    StatementSummary {
        opening_balance: OPENING.iter().find_map(capture).filter(|v| *v != 0.0),
        closing_balance: capture(&*CLOSING),
        ..StatementSummary::default()
    }
}

/// Parse extracted Metrobank statement text.
pub fn parse_metrobank_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let year = ctx.resolve_year(text);
    let currency = Currency::Php;

    let mut result = ParseResult::new(Issuer::Metrobank, BANK_NAME, text);
    result.currency = currency;
    result.summary = balances(text);
    result.summary.statement_year = Some(year);

    for line in statement_lines(text) {
        let columns = split_columns(line);
        if columns.len() < 3 {
            continue;
        }
        let Some((date, rest)) = leading_cell_date(columns[0], year) else {
            continue;
        };
        let mut cells: Vec<&str> = Vec::with_capacity(columns.len());
        if !rest.is_empty() {
            cells.push(rest);
        }
        cells.extend(&columns[1..]);

        let Some(description) = cells.first().copied() else {
            continue;
        };
        if PREVIOUS_BALANCE_ROW.is_match(description) {
            continue;
        }
        let withdrawal = cell_value(cells.get(1));
        let deposit = cell_value(cells.get(2));
        let balance = cells.get(3).and_then(|c| amount_cell(c));

        let mut amount = if withdrawal != 0.0 {
            -withdrawal.abs()
        } else {
            deposit
        };
        let either = if deposit != 0.0 { deposit } else { withdrawal };
        if CREDIT_DESCRIPTION.is_match(description) {
            amount = either.abs();
        }
        if DEBIT_DESCRIPTION.is_match(description) {
            amount = -either.abs();
        }
        if amount == 0.0 {
            debug!(line, "Metrobank: skipped zero row");
            continue;
        }

        result.transactions.push(
            Transaction::new(Some(date), description, amount, currency).with_balance(balance),
        );
    }

    if result.transactions.is_empty() {
        warn!("Metrobank parser found no transaction rows");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "METROBANK\n\
        Statement Period March 2024\n\
        Previous Balance: 50,000.00\n\
        DATE      DESCRIPTION            WITHDRAWAL    DEPOSIT      BALANCE\n\
        03/01     PREVIOUS BALANCE       -             -            50,000.00\n\
        03/02     WATER BILL             1,250.00      -            48,750.00\n\
        03/05     CHECK DEPOSIT          -             10,000.00    58,750.00\n\
        03/09     PAYROLL                5,000.00      -            53,750.00\n\
        03/12     ATM WITHDRAWAL         (2,000.00)    -            51,750.00\n\
        Closing Balance: 51,750.00\n";

    #[test]
    fn test_metrobank_rows() {
        let result = parse_metrobank_text(SAMPLE, &ParseContext::default()).unwrap();
        assert_eq!(result.currency, Currency::Php);
        let rows: Vec<(&str, f64)> = result
            .transactions
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("WATER BILL", -1250.0),
                ("CHECK DEPOSIT", 10000.0),
                ("PAYROLL", -5000.0),
                ("ATM WITHDRAWAL", -2000.0),
            ]
        );
        assert_eq!(result.transactions[0].date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(result.transactions[1].balance, Some(58750.0));
    }

    #[test]
    fn test_opening_goes_to_summary_only() {
        let result = parse_metrobank_text(SAMPLE, &ParseContext::default()).unwrap();
        assert_eq!(result.summary.opening_balance, Some(50000.0));
        assert_eq!(result.summary.closing_balance, Some(51750.0));
        assert!(
            result
                .transactions
                .iter()
                .all(|t| !t.description.to_lowercase().contains("previous"))
        );
    }

    #[test]
    fn test_date_and_description_in_one_cell() {
        let text = "03/15/24 GCASH PAYMENT   -   500.00   52,250.00";
        let result = parse_metrobank_text(text, &ParseContext::default()).unwrap();
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].description, "GCASH PAYMENT");
        assert_eq!(result.transactions[0].amount, 500.0);
        assert_eq!(result.transactions[0].date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }
}
