//! Statement-level types: issuer, summary block and the parser result contract

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::finance::{Currency, Transaction};

/// Statement issuers the classifier can recognize.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Issuer {
    Hsbc,
    Bdo,
    Bpi,
    Metrobank,
    Landbank,
    SecurityBank,
    Citibank,
    #[default]
    Unknown,
}

impl Issuer {
    pub fn display_name(&self) -> &'static str {
        match self {
            Issuer::Hsbc => "HSBC",
            Issuer::Bdo => "BDO Unibank",
            Issuer::Bpi => "Bank of the Philippine Islands",
            Issuer::Metrobank => "Metrobank",
            Issuer::Landbank => "Landbank",
            Issuer::SecurityBank => "Security Bank",
            Issuer::Citibank => "Citibank",
            Issuer::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Issuer {
    type Err = String;

    /// Accepts user input such as `hsbc`, `security-bank` or `SECURITY_BANK`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-', '_'], "");
        match key.as_str() {
            "hsbc" => Ok(Issuer::Hsbc),
            "bdo" | "bdounibank" => Ok(Issuer::Bdo),
            "bpi" => Ok(Issuer::Bpi),
            "metrobank" | "metro" => Ok(Issuer::Metrobank),
            "landbank" => Ok(Issuer::Landbank),
            "securitybank" => Ok(Issuer::SecurityBank),
            "citibank" | "citi" => Ok(Issuer::Citibank),
            "unknown" | "auto" => Ok(Issuer::Unknown),
            _ => Err(format!("unknown bank: {s}")),
        }
    }
}

/// Account identifiers printed on the statement header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountDetails {
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
}

impl AccountDetails {
    pub fn is_empty(&self) -> bool {
        self.account_number.is_none()
            && self.sort_code.is_none()
            && self.iban.is_none()
            && self.bic.is_none()
    }
}

/// Aggregate figures declared by the statement. Every field is optional
/// since layouts differ in what they print.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementSummary {
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub total_deposits: Option<f64>,
    pub total_withdrawals: Option<f64>,
    pub statement_year: Option<i32>,

    // Credit card statements
    pub previous_balance: Option<f64>,
    pub credit_limit: Option<f64>,
    pub available_credit: Option<f64>,
    pub minimum_payment: Option<f64>,
    pub total_due: Option<f64>,

    #[serde(default, skip_serializing_if = "AccountDetails::is_empty")]
    pub account: AccountDetails,
}

/// Uniform return shape of every grammar parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParseResult {
    pub transactions: Vec<Transaction>,
    pub summary: StatementSummary,
    pub bank_name: String,
    pub raw_text: String,
    pub detected_bank: Issuer,
    pub currency: Currency,
}

impl ParseResult {
    /// A result with no transactions, carrying only the raw text.
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            transactions: Vec::new(),
            summary: StatementSummary::default(),
            bank_name: Issuer::Unknown.display_name().to_string(),
            raw_text: raw_text.into(),
            detected_bank: Issuer::Unknown,
            currency: Currency::default(),
        }
    }

    pub fn new(issuer: Issuer, bank_name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            bank_name: bank_name.into(),
            detected_bank: issuer,
            ..Self::empty(raw_text)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Sum of all transaction amounts
    pub fn net_amount(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// Sort transactions by date; undated rows keep their order at the end.
    pub fn sort_by_date(&mut self) {
        self.transactions
            .sort_by_key(|t| (t.date.is_none(), t.date));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_issuer_from_user_input() {
        assert_eq!("hsbc".parse::<Issuer>().unwrap(), Issuer::Hsbc);
        assert_eq!("Security-Bank".parse::<Issuer>().unwrap(), Issuer::SecurityBank);
        assert_eq!("SECURITY_BANK".parse::<Issuer>().unwrap(), Issuer::SecurityBank);
        assert!("chase".parse::<Issuer>().is_err());
    }

    #[test]
    fn test_issuer_serializes_screaming() {
        let json = serde_json::to_string(&Issuer::SecurityBank).unwrap();
        assert_eq!(json, "\"SECURITY_BANK\"");
    }

    #[test]
    fn test_sort_by_date_keeps_undated_last() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day);
        let mut result = ParseResult::empty("");
        result.transactions = vec![
            Transaction::new(None, "undated", -1.0, Currency::Usd),
            Transaction::new(d(3, 2), "late", -2.0, Currency::Usd),
            Transaction::new(d(1, 5), "early", 3.0, Currency::Usd),
        ];
        result.sort_by_date();
        let order: Vec<_> = result.transactions.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["early", "late", "undated"]);
        assert_eq!(result.net_amount(), 0.0);
    }
}
