//! Deterministic categorization of statement rows.
//!
//! Priority: learned merchant map > learned keyword overlap > builtin keyword
//! table (first match wins) > `uncategorized`. No state is kept between calls.

use tally_core::Category;
use tracing::trace;

use crate::rules::CategoryRules;

/// Confidence for rows left uncategorized.
pub const UNCATEGORIZED_CONFIDENCE: f64 = 0.3;
/// Confidence when the description contains one of the category's keywords.
pub const KEYWORD_CONFIDENCE: f64 = 0.9;
/// Confidence for any other categorized row.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

/// Category from the learned patterns, if they decide one.
fn learned_category(rules: &CategoryRules, description: &str) -> Option<Category> {
    let upper = description.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }
    if let Some(category) = rules.merchants.get(&upper) {
        return Some(category.clone());
    }

    // keyword overlap; ties keep the earlier category
    let mut best: Option<(&Category, usize)> = None;
    for (category, keywords) in &rules.learned_keywords {
        let score = keywords.iter().filter(|k| upper.contains(k.as_str())).count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((category, score));
        }
    }
    best.map(|(category, _)| category.clone())
}

/// Assign a category to a description/amount pair.
pub fn categorize(rules: &CategoryRules, description: &str, amount: f64) -> Category {
    if let Some(category) = learned_category(rules, description) {
        trace!(description, %category, "learned category");
        return category;
    }

    let lower = description.to_lowercase();
    rules
        .keyword_rules
        .iter()
        .find(|r| r.matches(&lower, amount))
        .map_or(Category::Uncategorized, |rule| rule.category.clone())
}

pub fn confidence(rules: &CategoryRules, description: &str, category: &Category) -> f64 {
    if category.is_uncategorized() {
        return UNCATEGORIZED_CONFIDENCE;
    }
    let lower = description.to_lowercase();
    if rules.keywords_for(category).iter().any(|k| lower.contains(k.as_str())) {
        KEYWORD_CONFIDENCE
    } else {
        DEFAULT_CONFIDENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::LearnedPatterns;

    fn rules() -> CategoryRules {
        CategoryRules::builtin()
    }

    #[test]
    fn test_income_branch() {
        assert_eq!(categorize(&rules(), "ACME LTD SALARY", 1200.0), Category::Income);
        assert_eq!(categorize(&rules(), "CHECK DEPOSIT", 10_000.0), Category::Income);
        assert_eq!(categorize(&rules(), "TAX REFUND", 80.0), Category::Refund);
        assert_eq!(categorize(&rules(), "TRANSFER FROM BANKNET", 5000.0), Category::TransferIn);
        assert_eq!(categorize(&rules(), "MUTUAL FUND REDEMPTION", 300.0), Category::TransferIn);
    }

    #[test]
    fn test_unmatched_credit_is_uncategorized() {
        let r = rules();
        assert_eq!(categorize(&r, "XQZ 1142", 10.0), Category::Uncategorized);
        assert_eq!(confidence(&r, "XQZ 1142", &Category::Uncategorized), 0.3);
        // debit-only keywords never apply to money in
        assert_eq!(categorize(&r, "JOLLIBEE MAKATI", 350.0), Category::Uncategorized);
    }

    #[test]
    fn test_expense_cascade_order() {
        let r = rules();
        assert_eq!(categorize(&r, "Tesco Supermarket", -45.0), Category::Groceries);
        assert_eq!(categorize(&r, "JOLLIBEE MAKATI", -350.0), Category::Dining);
        assert_eq!(categorize(&r, "MERALCO ONLINE", -2100.0), Category::Utilities);
        assert_eq!(categorize(&r, "UBER TRIP", -28.9), Category::Transportation);
        assert_eq!(categorize(&r, "ATM WITHDRAWAL MAKATI", -2000.0), Category::CashWithdrawal);
        assert_eq!(categorize(&r, "INSTAPAY SEND TO J DOE", -500.0), Category::TransferOut);
        assert_eq!(categorize(&r, "CREDIT CARD PAYMENT", -900.0), Category::BillPayment);
        assert_eq!(categorize(&r, "LAZADA PH", -2000.0), Category::Shopping);
        assert_eq!(categorize(&r, "MERCURY DRUG", -120.0), Category::Healthcare);
        assert_eq!(categorize(&r, "MONTHLY RENT", -15_000.0), Category::Housing);
        assert_eq!(categorize(&r, "XQZ 1142", -10.0), Category::Uncategorized);
    }

    #[test]
    fn test_earlier_rule_wins() {
        // cash withdrawal, then bill payment, then transportation, then dining
        assert_eq!(categorize(&rules(), "CASH COFFEE SHOP", -20.0), Category::CashWithdrawal);
        assert_eq!(categorize(&rules(), "BP UBER TRIP", -28.9), Category::BillPayment);
        assert_eq!(categorize(&rules(), "SHELL CAFE", -12.0), Category::Transportation);
        assert_eq!(categorize(&rules(), "WATER BILL", -1250.0), Category::BillPayment);
    }

    #[test]
    fn test_categorize_is_idempotent() {
        let r = rules();
        let first = categorize(&r, "Grocery Store", -45.0);
        let second = categorize(&r, "Grocery Store", -45.0);
        assert_eq!(first, second);
        assert_eq!(
            confidence(&r, "Grocery Store", &first),
            confidence(&r, "Grocery Store", &second)
        );
    }

    #[test]
    fn test_confidence_levels() {
        let r = rules();
        assert_eq!(confidence(&r, "whatever", &Category::Uncategorized), 0.3);
        assert_eq!(confidence(&r, "Grocery Store", &Category::Groceries), 0.9);
        assert_eq!(confidence(&r, "TRANSFER FROM BANKNET", &Category::TransferIn), 0.9);
        assert_eq!(confidence(&r, "ACME LTD", &Category::TransferIn), 0.6);
    }

    #[test]
    fn test_learned_patterns_take_precedence() {
        let patterns: LearnedPatterns = serde_json::from_str(
            r#"{
                "merchant_categories": {"SHELL 2-4 NEW CROSS ROAD": "transportation"},
                "category_patterns": {
                    "subscriptions": ["NETFLIX", "SPOTIFY", "PREMIUM"],
                    "dining": ["SPOTIFY"]
                }
            }"#,
        )
        .unwrap();
        let r = CategoryRules::builtin().with_learned(&patterns);

        assert_eq!(
            categorize(&r, "shell 2-4 new cross road", -202.34),
            Category::Transportation
        );
        let subscriptions = Category::Learned("subscriptions".to_string());
        assert_eq!(categorize(&r, "SPOTIFY PREMIUM", -9.99), subscriptions);
        assert_eq!(confidence(&r, "SPOTIFY PREMIUM", &subscriptions), 0.9);
        // no learned hit: builtin table
        assert_eq!(categorize(&r, "Grocery Store", -45.0), Category::Groceries);
    }
}
