//! Transaction and category types shared by every stage of the pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single statement row after normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Transaction date; `None` until a date token was resolved
    pub date: Option<NaiveDate>,
    /// Posting date (credit card layouts print both)
    pub post_date: Option<NaiveDate>,
    pub description: String,
    /// Positive = credit/deposit, negative = debit/withdrawal
    pub amount: f64,
    /// Running balance when the layout prints one
    pub balance: Option<f64>,
    pub currency: Currency,
    /// Issuer transaction-type code (BP, CR, DD, ...)
    pub type_code: Option<String>,
    /// Issuer-level label assigned by the grammar parser
    pub raw_category: Option<String>,
    pub category: Option<Category>,
    /// Categorization confidence in [0, 1]
    pub confidence: Option<f64>,
    /// Synthesized to account for a balance discrepancy
    #[serde(default)]
    pub inferred: bool,
    /// Only found by the recovery OCR pass
    #[serde(default)]
    pub recovered: bool,
    /// Fields rewritten by the correction engine
    #[serde(default)]
    pub ai_corrected: bool,
    pub correction_reason: Option<String>,
    pub note: Option<String>,
    pub source_file: Option<String>,
}

impl Transaction {
    /// Create a transaction. Non-finite amounts are stored as 0.0.
    pub fn new(
        date: Option<NaiveDate>,
        description: impl Into<String>,
        amount: f64,
        currency: Currency,
    ) -> Self {
        Self {
            date,
            post_date: None,
            description: description.into(),
            amount: if amount.is_finite() { amount } else { 0.0 },
            balance: None,
            currency,
            type_code: None,
            raw_category: None,
            category: None,
            confidence: None,
            inferred: false,
            recovered: false,
            ai_corrected: false,
            correction_reason: None,
            note: None,
            source_file: None,
        }
    }

    pub fn with_balance(mut self, balance: Option<f64>) -> Self {
        self.balance = balance.filter(|b| b.is_finite());
        self
    }

    pub fn with_post_date(mut self, post_date: Option<NaiveDate>) -> Self {
        self.post_date = post_date;
        self
    }

    pub fn with_type_code(mut self, code: impl Into<String>) -> Self {
        self.type_code = Some(code.into());
        self
    }

    pub fn with_raw_category(mut self, label: impl Into<String>) -> Self {
        self.raw_category = Some(label.into());
        self
    }

    /// Returns true if this is a debit (negative amount)
    pub fn is_debit(&self) -> bool {
        self.amount < 0.0
    }

    /// Returns true if this is a credit (positive amount)
    pub fn is_credit(&self) -> bool {
        self.amount > 0.0
    }

    /// Get the absolute amount
    pub fn abs_amount(&self) -> f64 {
        self.amount.abs()
    }
}

/// Statement currencies the normalizer can recognize.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Jpy,
    Ils,
    Php,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Ils,
        Currency::Php,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Ils => "ILS",
            Currency::Php => "PHP",
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Currency::Usd => '$',
            Currency::Eur => '€',
            Currency::Gbp => '£',
            Currency::Jpy => '¥',
            Currency::Ils => '₪',
            Currency::Php => '₱',
        }
    }

    /// Case-insensitive lookup by ISO code.
    pub fn from_code(code: &str) -> Option<Currency> {
        let code = code.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Semantic transaction categories.
///
/// Names that only exist in a learned-pattern document are carried as
/// `Learned`. Serialized as the snake_case name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Income,
    TransferIn,
    Refund,
    CashWithdrawal,
    TransferOut,
    Groceries,
    Dining,
    Utilities,
    Transportation,
    BillPayment,
    Shopping,
    Healthcare,
    Payroll,
    BusinessExpense,
    Housing,
    OpeningBalance,
    Services,
    Uncategorized,
    Learned(String),
}

impl Category {
    const BUILTIN: [Category; 18] = [
        Category::Income,
        Category::TransferIn,
        Category::Refund,
        Category::CashWithdrawal,
        Category::TransferOut,
        Category::Groceries,
        Category::Dining,
        Category::Utilities,
        Category::Transportation,
        Category::BillPayment,
        Category::Shopping,
        Category::Healthcare,
        Category::Payroll,
        Category::BusinessExpense,
        Category::Housing,
        Category::OpeningBalance,
        Category::Services,
        Category::Uncategorized,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Income => "income",
            Category::TransferIn => "transfer_in",
            Category::Refund => "refund",
            Category::CashWithdrawal => "cash_withdrawal",
            Category::TransferOut => "transfer_out",
            Category::Groceries => "groceries",
            Category::Dining => "dining",
            Category::Utilities => "utilities",
            Category::Transportation => "transportation",
            Category::BillPayment => "bill_payment",
            Category::Shopping => "shopping",
            Category::Healthcare => "healthcare",
            Category::Payroll => "payroll",
            Category::BusinessExpense => "business_expense",
            Category::Housing => "housing",
            Category::OpeningBalance => "opening_balance",
            Category::Services => "services",
            Category::Uncategorized => "uncategorized",
            Category::Learned(name) => name,
        }
    }

    /// Resolve a category name, falling back to `Learned` for unknown names.
    pub fn from_name(name: &str) -> Category {
        let key = name.trim().to_lowercase().replace([' ', '-'], "_");
        Category::BUILTIN
            .into_iter()
            .find(|c| c.as_str() == key)
            .unwrap_or(Category::Learned(key))
    }

    pub fn is_uncategorized(&self) -> bool {
        matches!(self, Category::Uncategorized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::from_name(&s)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_creation() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let txn = Transaction::new(Some(date), "Grocery Store", -45.0, Currency::Usd)
            .with_balance(Some(955.0));
        assert!(txn.is_debit());
        assert_eq!(txn.abs_amount(), 45.0);
        assert_eq!(txn.balance, Some(955.0));
        assert!(!txn.inferred && !txn.recovered && !txn.ai_corrected);
    }

    #[test]
    fn test_non_finite_amount_is_zeroed() {
        let txn = Transaction::new(None, "x", f64::NAN, Currency::Usd);
        assert_eq!(txn.amount, 0.0);
    }

    #[test]
    fn test_category_names_round_trip() {
        assert_eq!(Category::from_name("bill_payment"), Category::BillPayment);
        assert_eq!(Category::from_name("Cash Withdrawal"), Category::CashWithdrawal);
        assert_eq!(
            Category::from_name("subscriptions"),
            Category::Learned("subscriptions".to_string())
        );

        let json = serde_json::to_string(&Category::TransferIn).unwrap();
        assert_eq!(json, "\"transfer_in\"");
        let back: Category = serde_json::from_str("\"dining\"").unwrap();
        assert_eq!(back, Category::Dining);
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::from_code("php"), Some(Currency::Php));
        assert_eq!(Currency::from_code("XYZ"), None);
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
    }
}
