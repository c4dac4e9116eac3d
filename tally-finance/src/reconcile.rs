//! Balance reconciliation: declared opening/closing balances against the sum
//! of the parsed rows. A gap larger than the tolerance becomes one inferred
//! transaction instead of being dropped.

use serde::Serialize;
use tally_core::{Category, Currency, StatementSummary, Transaction};
use tracing::{debug, warn};

pub const INFERRED_DESCRIPTION: &str = "INFERRED: Missing Transaction(s)";
pub const INFERRED_CONFIDENCE: f64 = 0.5;
/// Discrepancies at or below this are treated as rounding noise.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub opening: Option<f64>,
    /// opening + sum of observed amounts
    pub expected_closing: Option<f64>,
    /// Declared closing balance, or the last dated running balance
    pub declared_closing: Option<f64>,
    /// declared - expected
    pub discrepancy: Option<f64>,
    pub inferred: Option<Transaction>,
}

impl Reconciliation {
    /// True when both balances were known and agreed within tolerance.
    pub fn is_balanced(&self) -> bool {
        self.discrepancy.is_some() && self.inferred.is_none()
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Closing balance: the declared figure, else the running balance of the
/// latest dated row.
fn closing_balance(transactions: &[Transaction], summary: &StatementSummary) -> Option<f64> {
    summary.closing_balance.or_else(|| {
        transactions
            .iter()
            .filter(|t| t.date.is_some() && !t.inferred)
            .max_by_key(|t| t.date)
            .and_then(|t| t.balance)
    })
}

pub fn reconcile(
    transactions: &[Transaction],
    summary: &StatementSummary,
    tolerance: f64,
) -> Reconciliation {
    let observed: Vec<&Transaction> = transactions.iter().filter(|t| !t.inferred).collect();
    let opening = summary.opening_balance;
    let declared_closing = closing_balance(transactions, summary);

    let Some(opening_value) = opening else {
        debug!("no opening balance, skipping reconciliation");
        return Reconciliation {
            declared_closing,
            ..Reconciliation::default()
        };
    };
    let expected = opening_value + observed.iter().map(|t| t.amount).sum::<f64>();
    let mut rec = Reconciliation {
        opening,
        expected_closing: Some(round_cents(expected)),
        declared_closing,
        ..Reconciliation::default()
    };
    let Some(closing) = declared_closing else {
        return rec;
    };

    let discrepancy = round_cents(closing - expected);
    rec.discrepancy = Some(discrepancy);
    if discrepancy.abs() <= tolerance {
        return rec;
    }

    warn!(
        opening = opening_value,
        closing,
        expected = round_cents(expected),
        discrepancy,
        "balance mismatch, inferring missing transaction(s)"
    );
    let currency = observed.first().map_or(Currency::default(), |t| t.currency);
    let date = observed.iter().filter_map(|t| t.date).max();
    let mut inferred = Transaction::new(date, INFERRED_DESCRIPTION, discrepancy, currency);
    inferred.inferred = true;
    inferred.category = Some(Category::Uncategorized);
    inferred.confidence = Some(INFERRED_CONFIDENCE);
    inferred.note = Some(format!(
        "Balance discrepancy of {discrepancy:.2}: statement closes at {closing:.2} \
         but opening {opening_value:.2} plus parsed rows gives {:.2}",
        round_cents(expected)
    ));
    rec.inferred = Some(inferred);
    rec
}

/// Append the inferred row (if any) to a transaction list.
pub fn apply(transactions: &mut Vec<Transaction>, reconciliation: &Reconciliation) {
    if let Some(inferred) = &reconciliation.inferred {
        transactions.push(inferred.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn summary(opening: Option<f64>, closing: Option<f64>) -> StatementSummary {
        StatementSummary {
            opening_balance: opening,
            closing_balance: closing,
            ..StatementSummary::default()
        }
    }

    fn row(day: u32, amount: f64, balance: Option<f64>) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(2024, 6, day), "row", amount, Currency::Php)
            .with_balance(balance)
    }

    #[test]
    fn test_gap_becomes_inferred_row() {
        let rows = vec![row(1, 25.0, None), row(2, 15.0, None)];
        let rec = reconcile(&rows, &summary(Some(100.0), Some(150.0)), DEFAULT_TOLERANCE);

        assert_eq!(rec.expected_closing, Some(140.0));
        assert_eq!(rec.discrepancy, Some(10.0));
        let inferred = rec.inferred.as_ref().unwrap();
        assert_eq!(inferred.amount, 10.0);
        assert_eq!(inferred.description, "INFERRED: Missing Transaction(s)");
        assert!(inferred.inferred);
        assert_eq!(inferred.confidence, Some(0.5));
        assert_eq!(inferred.category, Some(Category::Uncategorized));
        assert_eq!(inferred.currency, Currency::Php);
        assert_eq!(inferred.date, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert!(inferred.note.as_deref().unwrap().contains("10.00"));
    }

    #[test]
    fn test_small_gap_is_tolerated() {
        let rows = vec![row(1, 49.5, None)];
        let rec = reconcile(&rows, &summary(Some(100.0), Some(150.0)), DEFAULT_TOLERANCE);
        assert_eq!(rec.discrepancy, Some(0.5));
        assert!(rec.inferred.is_none());
        assert!(rec.is_balanced());
    }

    #[test]
    fn test_running_balance_stands_in_for_closing() {
        let rows = vec![row(15, -45.0, Some(955.0))];
        let rec = reconcile(&rows, &summary(Some(1000.0), None), DEFAULT_TOLERANCE);
        assert_eq!(rec.declared_closing, Some(955.0));
        assert_eq!(rec.discrepancy, Some(0.0));
        assert!(rec.is_balanced());
    }

    #[test]
    fn test_missing_opening_skips() {
        let rows = vec![row(1, 10.0, Some(10.0))];
        let rec = reconcile(&rows, &summary(None, Some(500.0)), DEFAULT_TOLERANCE);
        assert_eq!(rec.discrepancy, None);
        assert!(rec.inferred.is_none());
        assert!(!rec.is_balanced());
    }

    #[test]
    fn test_previous_inferred_rows_are_ignored() {
        let mut rows = vec![row(1, 40.0, None)];
        let first = reconcile(&rows, &summary(Some(100.0), Some(150.0)), DEFAULT_TOLERANCE);
        apply(&mut rows, &first);
        assert_eq!(rows.len(), 2);

        let again = reconcile(&rows, &summary(Some(100.0), Some(150.0)), DEFAULT_TOLERANCE);
        assert_eq!(again.discrepancy, Some(10.0));
    }
}
