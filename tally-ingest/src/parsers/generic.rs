//! Generic statement grammar.
//!
//! Used for issuers without a dedicated layout and as the last resort when a
//! dedicated grammar declines. Expected shape:
//!   Opening balance                          1,000.00
//!   Date      Description        Withdrawals  Deposits   Balance
//!   15 Jun    Grocery Store      45.00                   955.00
//!   16 Jun    Salary ACME                     2,000.00   2,955.00

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    Issuer, ParseResult, date::leading_date, date::resolve_token, detect_currency,
};
use tracing::debug;

use crate::grammar::{
    Grammar, HEADER_SCAN_LINES, LineParts, ParseContext, RowBuilder, SingleAmount,
    StatementParser, find_table_header, is_header_line, is_sentinel, statement_lines,
};
use crate::summary::{extract_summary, is_summary_line};

pub const BANK_NAME: &str = "Generic Statement";

const SENTINELS: &[&str] = &["end of statement", "end of transaction"];

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(page\s+\d+(\s+of\s+\d+)?|.*continued on next page.*|continued.*)$").unwrap()
});

pub struct GenericParser;

impl StatementParser for GenericParser {
    fn grammar(&self) -> Grammar {
        Grammar::Generic
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_generic_text(text, ctx)
    }
}

/// Parse any dated, column-ish statement text.
pub fn parse_generic_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let lines = statement_lines(text);
    let year = ctx.resolve_year(text);
    let currency = detect_currency(text);

    let mut result = ParseResult::new(Issuer::Unknown, BANK_NAME, text);
    result.currency = currency;
    result.summary = extract_summary(&lines);
    result.summary.statement_year = Some(year);

    let header = find_table_header(&lines, HEADER_SCAN_LINES);
    let start = header.map_or(0, |h| h.index + 1);
    debug!(?header, year, "generic grammar scan");

    let mut running = result.summary.opening_balance;
    let mut current: Option<RowBuilder> = None;
    let mut flush = |row: Option<RowBuilder>, running: &mut Option<f64>| {
        let Some(row) = row else { return };
        if row.balance.is_some() {
            *running = row.balance;
        }
        match row.into_transaction(currency) {
            Some(txn) => result.transactions.push(txn),
            None => debug!("dropped row without an amount"),
        }
    };

    for line in &lines[start..] {
        let lower = line.to_lowercase();
        if is_sentinel(&lower, SENTINELS) {
            break;
        }
        if NOISE.is_match(line) || is_header_line(line) {
            continue;
        }
        if is_summary_line(line) {
            flush(current.take(), &mut running);
            continue;
        }

        if let Some(lead) = leading_date(line) {
            if let Some(date) = resolve_token(lead.token, year) {
                flush(current.take(), &mut running);
                let mut row = RowBuilder::start(Some(date));
                // a lone amount on a line is a running balance
                row.absorb(&LineParts::split(lead.rest), SingleAmount::Balance, running);
                current = Some(row);
                continue;
            }
        }

        if let Some(row) = current.as_mut() {
            row.absorb(&LineParts::split(line), SingleAmount::Balance, running);
        }
    }
    flush(current.take(), &mut running);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::Currency;

    #[test]
    fn test_headerless_two_line_statement() {
        let text = "Opening balance 1,000.00\n15 Jun  Grocery Store   45.00   955.00\n";
        let result = parse_generic_text(text, &ParseContext::with_year(2024)).unwrap();
        assert_eq!(result.transactions.len(), 1);
        let txn = &result.transactions[0];
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(txn.description, "Grocery Store");
        assert_eq!(txn.amount, -45.0);
        assert_eq!(txn.balance, Some(955.0));
        assert_eq!(result.summary.opening_balance, Some(1000.0));
    }

    #[test]
    fn test_header_table_with_continuations() {
        let text = r#"
Riverside Credit Union
Account Statement 2024
Opening Balance                                   500.00
Date        Description              Withdrawals    Deposits     Balance
03/01/2024  POS PURCHASE                   25.00                  475.00
            CORNER MARKET #12
03/02/2024  PAYROLL DEPOSIT                           1,200.00   1,675.00
Page 1 of 2
03/05/2024  ATM WITHDRAWAL                100.00                1,575.00
Closing Balance                                 1,575.00
"#;
        let result = parse_generic_text(text, &ParseContext::default()).unwrap();
        let amounts: Vec<f64> = result.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![-25.0, 1200.0, -100.0]);
        assert_eq!(result.transactions[0].description, "POS PURCHASE CORNER MARKET #12");
        assert_eq!(result.summary.closing_balance, Some(1575.0));
        assert_eq!(result.currency, Currency::Usd);
    }

    #[test]
    fn test_stops_at_end_of_statement() {
        let text = "01/02/2024 Coffee 4.50 95.50\n*** End of Statement ***\n01/03/2024 Ghost row 9.99 85.51\n";
        let result = parse_generic_text(text, &ParseContext::default()).unwrap();
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].amount, -4.5);
    }

    #[test]
    fn test_single_amount_line_is_balance_only() {
        let text = "Opening balance 100.00\n\
            01/02/2024 Fee waived 100.00\n\
            01/03/2024 Coffee 4.50 95.50\n";
        let result = parse_generic_text(text, &ParseContext::default()).unwrap();
        let rows: Vec<(&str, f64)> = result
            .transactions
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(rows, vec![("Coffee", -4.5)]);
        assert_eq!(result.transactions[0].balance, Some(95.5));
    }

    #[test]
    fn test_no_rows_is_empty_not_error() {
        let result = parse_generic_text("nothing to see here", &ParseContext::default()).unwrap();
        assert!(result.is_empty());
    }
}
