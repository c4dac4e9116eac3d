//! Point-of-sale receipt grammar.
//!
//! A receipt becomes one negative transaction for its printed total, dated by
//! the first readable date and described by the merchant line. Receipts
//! without a total line fall back to one row per priced item.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    Issuer, ParseResult, Transaction, amount::find_amounts, date::leading_date,
    date::resolve_token, detect_currency, parse_date_with_year,
};
use tracing::debug;

use crate::grammar::{Grammar, ParseContext, StatementParser, statement_lines};

pub const BANK_NAME: &str = "Receipt";

static TOTAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:grand\s+)?total\b").unwrap());
static NOT_AN_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sub\s*-?total|total|tax|vat|change|cash|tendered|visa|mastercard|amount due|balance)\b")
        .unwrap()
});
static DATE_IN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|",
        r"[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}|\d{1,2}\s+[A-Za-z]{3,9}\.?\s+\d{4})\b"
    ))
    .unwrap()
});

pub struct ReceiptParser;

impl StatementParser for ReceiptParser {
    fn grammar(&self) -> Grammar {
        Grammar::Receipt
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_receipt_text(text, ctx)
    }
}

/// First line that reads like a name rather than a number or date.
fn merchant(lines: &[&str]) -> Option<String> {
    lines
        .iter()
        .find(|line| {
            line.chars().filter(|c| c.is_alphabetic()).count() >= 3
                && find_amounts(line).is_empty()
                && leading_date(line).is_none()
        })
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn receipt_date(lines: &[&str], year: i32) -> Option<chrono::NaiveDate> {
    lines.iter().find_map(|line| {
        DATE_IN_LINE.find_iter(line).find_map(|m| {
            parse_date_with_year(m.as_str(), year).or_else(|| resolve_token(m.as_str(), year))
        })
    })
}

/// Parse receipt text.
pub fn parse_receipt_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let lines = statement_lines(text);
    let year = ctx.resolve_year(text);
    let currency = detect_currency(text);
    let merchant = merchant(&lines).unwrap_or_else(|| BANK_NAME.to_string());
    let date = receipt_date(&lines, year);

    let mut result = ParseResult::new(Issuer::Unknown, BANK_NAME, text);
    result.currency = currency;
    result.summary.statement_year = Some(year);

    let total = lines.iter().find_map(|line| {
        if !TOTAL_LINE.is_match(line) {
            return None;
        }
        find_amounts(line).last().map(|t| t.value.abs())
    });

    if let Some(total) = total {
        debug!(%merchant, total, "receipt total");
        result
            .transactions
            .push(Transaction::new(date, merchant, -total, currency).with_raw_category("Receipt"));
        return Ok(result);
    }

    for line in &lines {
        if NOT_AN_ITEM.is_match(line) {
            continue;
        }
        let tokens = find_amounts(line);
        let Some(price) = tokens.last() else {
            continue;
        };
        let item = line[..price.start].trim();
        if item.chars().filter(|c| c.is_alphabetic()).count() < 2 {
            continue;
        }
        let description = format!("{merchant}: {}", item.split_whitespace().collect::<Vec<_>>().join(" "));
        result.transactions.push(
            Transaction::new(date, description, -price.value.abs(), currency)
                .with_raw_category("Receipt Item"),
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::Currency;

    #[test]
    fn test_receipt_total_becomes_one_debit() {
        let text = r#"
BLUE BOTTLE COFFEE
123 Market St
03/14/2024 08:15
Cashier #4
Latte          $4.50
Croissant      $3.25
Subtotal       $7.75
Tax            $0.62
TOTAL          $8.37
Thank you for shopping
"#;
        let result = parse_receipt_text(text, &ParseContext::default()).unwrap();
        assert_eq!(result.bank_name, "Receipt");
        assert_eq!(result.currency, Currency::Usd);
        assert_eq!(result.transactions.len(), 1);
        let txn = &result.transactions[0];
        assert_eq!(txn.description, "BLUE BOTTLE COFFEE");
        assert_eq!(txn.amount, -8.37);
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2024, 3, 14));
    }

    #[test]
    fn test_receipt_without_total_lists_items() {
        let text = "CORNER DELI\n2024-05-02\nSandwich 6.50\nSoda 1.75\nTax 0.66\nCash 10.00\nChange 1.09\n";
        let result = parse_receipt_text(text, &ParseContext::default()).unwrap();
        let rows: Vec<(&str, f64)> = result
            .transactions
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(rows, vec![("CORNER DELI: Sandwich", -6.5), ("CORNER DELI: Soda", -1.75)]);
    }
}
