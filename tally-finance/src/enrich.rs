//! Correction + categorization pass over a parsed statement.

use serde::Serialize;
use tally_core::{ParseResult, Transaction};
use tracing::info;

use crate::category_rules::{categorize, confidence};
use crate::correction::correct;
use crate::rules::CategoryRules;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentStats {
    /// Mean categorization confidence; 0.0 for an empty statement
    pub average_confidence: f64,
    pub corrections_made: usize,
    /// Rows that ended up with a category other than `uncategorized`
    pub categorized: usize,
}

#[derive(Debug, Clone)]
pub struct Enriched {
    pub result: ParseResult,
    pub stats: EnrichmentStats,
}

impl EnrichmentStats {
    /// Stats over an already enriched row list. Inferred rows do not count
    /// towards the average.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let scored: Vec<f64> = transactions
            .iter()
            .filter(|t| !t.inferred)
            .filter_map(|t| t.confidence)
            .collect();
        let average_confidence = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };
        Self {
            average_confidence,
            corrections_made: transactions.iter().filter(|t| t.ai_corrected).count(),
            categorized: transactions
                .iter()
                .filter(|t| t.category.as_ref().is_some_and(|c| !c.is_uncategorized()))
                .count(),
        }
    }
}

/// Correct and categorize one row. Inferred rows pass through untouched;
/// recovered rows keep the confidence the recovery pass gave them.
pub fn enrich_transaction(rules: &CategoryRules, txn: &Transaction) -> Transaction {
    if txn.inferred {
        return txn.clone();
    }
    let mut out = correct(rules, txn);
    let category = categorize(rules, &out.description, out.amount);
    let scored = confidence(rules, &out.description, &category);
    out.confidence = match txn.confidence {
        Some(kept) if txn.recovered => Some(kept),
        _ => Some(scored),
    };
    out.category = Some(category);
    out
}

/// Build a new result with every row corrected and categorized. The input is
/// left as it was.
pub fn enrich(rules: &CategoryRules, parsed: &ParseResult) -> Enriched {
    let transactions: Vec<Transaction> = parsed
        .transactions
        .iter()
        .map(|t| enrich_transaction(rules, t))
        .collect();

    let stats = EnrichmentStats::from_transactions(&transactions);
    info!(
        rows = transactions.len(),
        corrections = stats.corrections_made,
        categorized = stats.categorized,
        "enriched statement"
    );

    Enriched {
        result: ParseResult {
            transactions,
            ..parsed.clone()
        },
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Category, Currency, Issuer};

    fn statement(rows: &[(&str, f64)]) -> ParseResult {
        let mut result = ParseResult::new(Issuer::Hsbc, "HSBC UK", "raw");
        result.transactions = rows
            .iter()
            .map(|(d, a)| Transaction::new(None, *d, *a, Currency::Gbp))
            .collect();
        result
    }

    #[test]
    fn test_enrich_returns_new_rows() {
        let parsed = statement(&[("Grocery Store", -45.0), ("", 7.0), ("XQZ", -3.0)]);
        let enriched = enrich(&CategoryRules::builtin(), &parsed);

        // input untouched
        assert!(parsed.transactions.iter().all(|t| t.category.is_none()));

        let rows = &enriched.result.transactions;
        assert_eq!(rows[0].category, Some(Category::Groceries));
        assert_eq!(rows[0].confidence, Some(0.9));
        assert_eq!(rows[1].description, "BP Costa Coffee");
        assert_eq!(rows[1].category, Some(Category::BillPayment));
        assert_eq!(rows[2].category, Some(Category::Uncategorized));

        assert_eq!(enriched.stats.corrections_made, 1);
        assert_eq!(enriched.stats.categorized, 2);
        assert!((enriched.stats.average_confidence - 0.7).abs() < 1e-9);
        assert_eq!(enriched.result.bank_name, "HSBC UK");
    }

    #[test]
    fn test_inferred_rows_pass_through() {
        let mut parsed = statement(&[]);
        let mut inferred = Transaction::new(None, "INFERRED: Missing Transaction(s)", 10.0, Currency::Usd);
        inferred.inferred = true;
        inferred.category = Some(Category::Uncategorized);
        inferred.confidence = Some(0.5);
        parsed.transactions.push(inferred.clone());

        let enriched = enrich(&CategoryRules::builtin(), &parsed);
        assert_eq!(enriched.result.transactions[0], inferred);
        assert_eq!(enriched.stats.average_confidence, 0.0);
    }

    #[test]
    fn test_recovered_rows_keep_their_confidence() {
        let mut recovered = Transaction::new(None, "Grocery Store", -45.0, Currency::Gbp);
        recovered.recovered = true;
        recovered.confidence = Some(0.7);

        let out = enrich_transaction(&CategoryRules::builtin(), &recovered);
        assert_eq!(out.category, Some(Category::Groceries));
        assert_eq!(out.confidence, Some(0.7));
    }

    #[test]
    fn test_empty_statement() {
        let enriched = enrich(&CategoryRules::builtin(), &statement(&[]));
        assert_eq!(enriched.stats, EnrichmentStats::default());
    }
}
