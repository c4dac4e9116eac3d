//! Plain-text table for terminal output.

use std::fmt::Write;

use tally_core::Transaction;
use tally_extract::Extraction;

const DESCRIPTION_WIDTH: usize = 42;

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width - 1).collect();
    out.push('…');
    out
}

fn marker(t: &Transaction) -> &'static str {
    if t.inferred {
        "?"
    } else if t.recovered {
        "+"
    } else if t.ai_corrected {
        "*"
    } else {
        ""
    }
}

pub fn render(extraction: &Extraction) -> String {
    let result = &extraction.result;
    let mut out = String::new();

    let _ = writeln!(out, "{} ({})", result.bank_name, result.currency);
    let _ = writeln!(
        out,
        "{:<10}  {:<w$}  {:>12}  {:<18}",
        "DATE",
        "DESCRIPTION",
        "AMOUNT",
        "CATEGORY",
        w = DESCRIPTION_WIDTH
    );
    for t in &result.transactions {
        let date = t
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let category = t
            .category
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<10}  {:<w$}  {:>12.2}  {:<18} {}",
            date,
            clip(&t.description, DESCRIPTION_WIDTH),
            t.amount,
            category,
            marker(t),
            w = DESCRIPTION_WIDTH
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} transactions, net {:.2}, {} categorized, {} corrected",
        result.transactions.len(),
        result.net_amount(),
        extraction.enrichment.categorized,
        extraction.enrichment.corrections_made
    );
    if extraction.recovery_performed {
        let _ = writeln!(
            out,
            "recovery pass: {} first-pass rows, {} recovered (+)",
            extraction.original_count, extraction.recovered_count
        );
    }
    if let Some(rec) = &extraction.reconciliation {
        match (rec.opening, rec.declared_closing, rec.discrepancy) {
            (Some(opening), Some(closing), Some(gap)) if rec.inferred.is_some() => {
                let _ = writeln!(
                    out,
                    "balances: opening {opening:.2}, closing {closing:.2}, off by {gap:.2} (inferred row ?)"
                );
            }
            (Some(opening), Some(closing), Some(_)) => {
                let _ = writeln!(out, "balances: opening {opening:.2}, closing {closing:.2}, reconciled");
            }
            _ => {
                let _ = writeln!(out, "balances: not enough balance information to reconcile");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Category, Currency, ParseResult};
    use tally_finance::Reconciliation;

    #[test]
    fn test_clip_counts_chars() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("ÑÑÑÑÑÑ", 4), "ÑÑÑ…");
    }

    #[test]
    fn test_render_rows_and_reconciliation() {
        let mut txn = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 6, 15),
            "Grocery Store",
            -45.0,
            Currency::Usd,
        );
        txn.category = Some(Category::Groceries);
        let mut result = ParseResult::empty("raw");
        result.transactions.push(txn);

        let extraction = Extraction {
            result,
            reconciliation: Some(Reconciliation {
                opening: Some(1000.0),
                expected_closing: Some(955.0),
                declared_closing: Some(955.0),
                discrepancy: Some(0.0),
                inferred: None,
            }),
            ..Extraction::default()
        };
        let text = render(&extraction);
        assert!(text.contains("2024-06-15"));
        assert!(text.contains("-45.00"));
        assert!(text.contains("groceries"));
        assert!(text.contains("1 transactions, net -45.00"));
        assert!(text.contains("opening 1000.00, closing 955.00, reconciled"));
    }
}
