//! HSBC Philippines credit card statement parser (text)
//!
//! Expected extracted-text section:
//!   POST DATE   TRAN DATE   DESCRIPTION                     AMOUNT
//!   05 Aug      04 Aug      JOLLIBEE MAKATI                 350.00
//!   12 Aug      12 Aug      PAYMENT - THANK YOU          15,000.00

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::{
    Currency, Issuer, ParseResult, StatementSummary, Transaction, date::parse_day_month,
    parse_amount,
};
use tracing::debug;

use crate::grammar::{Grammar, ParseContext, StatementParser, statement_lines};
use crate::types::first_year;

pub const BANK_NAME: &str = "HSBC Philippines";

/// A standalone amount above this ends the transaction table (the "Total
/// Due" figure printed underneath it).
const TOTAL_DUE_FLOOR: f64 = 50_000.0;

static HEADERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)POST\s+DATE\s+TRAN\s+DATE\s+DESCRIPTION\s+AMOUNT",
        r"(?i)POST[\s\t]+TRAN",
        r"(?i)DATE[\s\t]+DATE[\s\t]+DESCRIPTION[\s\t]+AMOUNT",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static EXCLUDE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Previous\s+Statement\s+Balance",
        r"(?i)ACCOUNT\s+SUMMARY",
        r"(?i)PAYMENT\s+SUMMARY",
        r"(?i)CREDIT\s+LIMIT",
        r"(?i)INTEREST\s+RATES",
        r"(?i)Total\s+Due",
        r"(?i)Minimum\s+Payment",
        r"(?i)Page\s+\d+\s+of\s+\d+",
        r"(?i)CONTACT\s+US",
        r"(?i)Customer\s+Service",
        r"(?i)Continued\s+on\s+next\s+page",
        r"(?i)HSBC\s+GOLD\s+VISA",
        r"(?i)Card\s+Products",
        r"(?i)The\s+Hongkong",
        r"(?i)Makati\s+City",
        r"(?i)Metro\s+Manila",
        r"(?i)\d{4}[-\s]?X{4}[-\s]?X{4}[-\s]?\d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static STANDALONE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d,]+\.\d{2}$").unwrap());

static ROW: Lazy<Regex> = Lazy::new(|| {
    let month = "(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)";
    Regex::new(&format!(
        r"(?i)^(\d{{1,2}}\s+{month})\s+(\d{{1,2}}\s+{month})\s+(.+?)\s+([\d,]+\.\d{{2}})$"
    ))
    .unwrap()
});

static STATEMENT_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Statement\s+from\s+\d{1,2}\s+\w+\s+(\d{4})").unwrap());

/// Summary labels and the field each one fills.
static SUMMARY_FIELDS: Lazy<Vec<(Regex, fn(&mut StatementSummary, f64))>> = Lazy::new(|| {
    let fields: [(&str, fn(&mut StatementSummary, f64)); 7] = [
        (r"Previous\s+Balance", |s, v| s.previous_balance = Some(v)),
        (r"Payments?\s+(?:&|and)\s+Credits?", |s, v| s.total_deposits = Some(v)),
        (r"Purchases", |s, v| s.total_withdrawals = Some(v)),
        (r"Total\s+Due", |s, v| s.total_due = Some(v)),
        (r"Minimum\s+Payment", |s, v| s.minimum_payment = Some(v)),
        (r"Credit\s+Limit(?:\s+\(PHP\))?", |s, v| s.credit_limit = Some(v)),
        (r"Available\s+Credit(?:\s+\(PHP\))?", |s, v| s.available_credit = Some(v)),
    ];
    fields
        .into_iter()
        .map(|(label, set)| {
            let re = Regex::new(&format!(r"(?i){label}\s+([\d,]+\.?\d*)")).unwrap();
            (re, set)
        })
        .collect()
});

static CURRENT_BALANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Current\s+Balance\s+([\d,]+\.?\d*)").unwrap());

const CREDIT_KEYWORDS: &[&str] = &["payment", "credit", "reversal", "refund", "cashback"];

pub struct HsbcPhParser;

impl StatementParser for HsbcPhParser {
    fn grammar(&self) -> Grammar {
        Grammar::HsbcPh
    }

    fn parse(&self, text: &str, ctx: &ParseContext) -> Result<ParseResult> {
        parse_hsbc_ph_text(text, ctx)
    }
}

/// Statement year from "Statement from 04 AUG 2025", else the first `20xx`.
pub fn statement_year(text: &str) -> Option<i32> {
    STATEMENT_FROM
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .or_else(|| first_year(text))
}

/// Account, payment and credit-limit boxes.
///
/// Card balances are liabilities, so the opening and closing balances are
/// stored negated: a payment (positive row) moves the balance toward zero.
pub fn card_summary(text: &str) -> StatementSummary {
    let mut summary = StatementSummary::default();
    for (re, set) in SUMMARY_FIELDS.iter() {
        if let Some(value) = re.captures(text).and_then(|caps| parse_amount(&caps[1])) {
            set(&mut summary, value);
        }
    }
    let current = CURRENT_BALANCE
        .captures(text)
        .and_then(|caps| parse_amount(&caps[1]));
    summary.opening_balance = summary.previous_balance.map(|v| -v);
    summary.closing_balance = current.map(|v| -v);
    summary
}

fn is_credit(description: &str) -> bool {
    let lower = description.to_lowercase();
    CREDIT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Parse extracted HSBC Philippines credit card text.
pub fn parse_hsbc_ph_text(text: &str, ctx: &ParseContext) -> Result<ParseResult> {
    let year = ctx
        .statement_year
        .or_else(|| statement_year(text))
        .unwrap_or_else(|| ctx.resolve_year(text));
    let currency = Currency::Php;

    let mut result = ParseResult::new(Issuer::Hsbc, BANK_NAME, text);
    result.currency = currency;
    result.summary = card_summary(text);
    result.summary.statement_year = Some(year);

    let mut in_section = false;
    for line in statement_lines(text) {
        if line.len() < 5 {
            continue;
        }
        if !in_section {
            in_section = HEADERS.iter().any(|re| re.is_match(line));
            continue;
        }
        if EXCLUDE.iter().any(|re| re.is_match(line)) {
            continue;
        }
        if STANDALONE_AMOUNT.is_match(line)
            && parse_amount(line).is_some_and(|v| v > TOTAL_DUE_FLOOR)
        {
            debug!(line, "HSBC PH: reached total due");
            break;
        }

        let Some(caps) = ROW.captures(line) else {
            continue;
        };
        let Some(post_date) = parse_day_month(&caps[1], year) else {
            debug!(line, "HSBC PH: bad post date");
            continue;
        };
        let tran_date = parse_day_month(&caps[2], year);
        let description = caps[3].trim();
        let Some(amount) = parse_amount(&caps[4]).filter(|a| *a != 0.0) else {
            continue;
        };
        let signed = if is_credit(description) { amount } else { -amount };

        result.transactions.push(
            Transaction::new(Some(post_date), description, signed, currency)
                .with_post_date(tran_date)
                .with_raw_category(if signed > 0.0 { "Payment" } else { "Purchase" }),
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"
HSBC Red Mastercard
Statement from 04 AUG 2025 to 03 SEP 2025
ACCOUNT SUMMARY
Previous Balance 15,000.00
Payments & Credits 15,000.00
Purchases 2,350.00
Current Balance 2,350.00
Credit Limit (PHP) 100,000.00
Available Credit 97,650.00
POST DATE TRAN DATE DESCRIPTION AMOUNT
05 Aug 04 Aug JOLLIBEE MAKATI 350.00
12 Aug 12 Aug PAYMENT - THANK YOU 15,000.00
20 Aug 19 Aug LAZADA PH 2,000.00
Page 1 of 2
100,000.00
25 Aug 25 Aug AFTER TOTAL 10.00
"#;

    #[test]
    fn test_card_rows_and_signs() {
        let result = parse_hsbc_ph_text(SAMPLE, &ParseContext::default()).unwrap();
        assert_eq!(result.currency, Currency::Php);
        let rows: Vec<(&str, f64)> = result
            .transactions
            .iter()
            .map(|t| (t.description.as_str(), t.amount))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("JOLLIBEE MAKATI", -350.0),
                ("PAYMENT - THANK YOU", 15000.0),
                ("LAZADA PH", -2000.0),
            ]
        );
        let first = &result.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 8, 5));
        assert_eq!(first.post_date, NaiveDate::from_ymd_opt(2025, 8, 4));
    }

    #[test]
    fn test_card_summary_balances_are_liabilities() {
        let s = card_summary(SAMPLE);
        assert_eq!(s.previous_balance, Some(15000.0));
        assert_eq!(s.opening_balance, Some(-15000.0));
        assert_eq!(s.closing_balance, Some(-2350.0));
        assert_eq!(s.total_deposits, Some(15000.0));
        assert_eq!(s.total_withdrawals, Some(2350.0));
        assert_eq!(s.credit_limit, Some(100000.0));
        assert_eq!(s.available_credit, Some(97650.0));
    }
}
