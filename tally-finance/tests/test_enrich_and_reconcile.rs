use pretty_assertions::assert_eq;
use tally_core::{Category, Issuer};
use tally_finance::{CategoryRules, DEFAULT_TOLERANCE, LearnedPatterns, RulesSource};
use tally_finance::{enrich, load_rules, reconcile};
use tally_ingest::{ParseContext, ParseRequest, parse_text};

const METROBANK: &str = "METROBANK\n\
    Statement Period March 2024\n\
    Previous Balance: 50,000.00\n\
    DATE      DESCRIPTION            WITHDRAWAL    DEPOSIT      BALANCE\n\
    03/02     WATER BILL             1,250.00      -            48,750.00\n\
    03/05     CHECK DEPOSIT          -             10,000.00    58,750.00\n\
    03/09     PAYROLL                5,000.00      -            53,750.00\n\
    Closing Balance: 55,750.00\n";

fn parse(text: &str) -> tally_core::ParseResult {
    parse_text(text, &ParseRequest::new(ParseContext::with_year(2024)))
}

#[test]
fn test_statement_rows_are_categorized() {
    let parsed = parse(METROBANK);
    assert_eq!(parsed.detected_bank, Issuer::Metrobank);

    let enriched = enrich(&CategoryRules::builtin(), &parsed);
    let categories: Vec<Option<Category>> = enriched
        .result
        .transactions
        .iter()
        .map(|t| t.category.clone())
        .collect();
    assert_eq!(
        categories,
        vec![
            Some(Category::BillPayment),
            Some(Category::Income),
            Some(Category::Payroll),
        ]
    );
    assert_eq!(enriched.stats.categorized, 3);
}

#[test]
fn test_missing_row_is_inferred() {
    // rows net to +3,750; the declared closing balance implies +5,750
    let parsed = parse(METROBANK);
    let rec = reconcile(&parsed.transactions, &parsed.summary, DEFAULT_TOLERANCE);

    assert_eq!(rec.expected_closing, Some(53_750.0));
    assert_eq!(rec.discrepancy, Some(2_000.0));
    let inferred = rec.inferred.unwrap();
    assert!(inferred.inferred);
    assert_eq!(inferred.amount, 2_000.0);
}

#[test]
fn test_balanced_statement_has_no_inferred_row() {
    let parsed = parse("Opening balance 1,000.00\n15 Jun  Grocery Store   45.00   955.00\n");
    let rec = reconcile(&parsed.transactions, &parsed.summary, DEFAULT_TOLERANCE);
    assert_eq!(rec.discrepancy, Some(0.0));
    assert!(rec.inferred.is_none());
}

#[test]
fn test_learned_merchant_overrides_builtin() {
    let patterns: LearnedPatterns = serde_json::from_str(
        r#"{"merchantMappings": {"WATER BILL": "housing"}, "categoryPatterns": {}}"#,
    )
    .unwrap();
    let rules = load_rules(&RulesSource::Inline(patterns));
    let enriched = enrich(&rules, &parse(METROBANK));
    assert_eq!(
        enriched.result.transactions[0].category,
        Some(Category::Housing)
    );
}
