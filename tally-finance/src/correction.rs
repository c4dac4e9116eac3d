//! Field repair for rows that OCR damaged.
//!
//! Order: signature table (rows whose description was lost entirely), then
//! description inference, sign repair and cosmetic cleanup.

use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::Transaction;
use tracing::debug;

use crate::rules::CategoryRules;

const CREDIT_MARKERS: &[&str] = &[
    "credit",
    "received",
    "deposit",
    "transfer in",
    "balance brought",
    "refund",
    "reversal",
];

const DEBIT_MARKERS: &[&str] = &["debit", "withdrawal", "drawn on"];

static DEC_MISREAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bDee\b").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A description with no letters at all was lost by OCR.
fn description_lost(description: &str) -> bool {
    !description.chars().any(char::is_alphabetic)
}

/// Placeholder description from the sign and size of the amount.
pub fn infer_description(amount: f64) -> &'static str {
    match amount {
        a if a > 1000.0 => "CR Transfer",
        a if a > 100.0 => "CR Cheque Deposit",
        a if a > 0.0 => "CR Credit",
        a if a < -500.0 => "BP Payment Debit",
        a if a < -50.0 => "BP Debit",
        a if a < 0.0 => "BP Small Debit",
        _ => "BALANCE BROUGHT FORWARD",
    }
}

fn has_code(lower: &str, code: &str) -> bool {
    lower.starts_with(code) && lower[code.len()..].starts_with(' ')
}

/// `code` as a word of its own anywhere in the description.
fn mentions_code(lower: &str, code: &str) -> bool {
    lower.split_whitespace().any(|word| word == code)
}

/// Force the sign of `amount` to agree with explicit credit/debit wording.
/// Credit wording is checked first.
pub fn correct_sign(description: &str, amount: f64) -> f64 {
    let lower = description.to_lowercase();
    if mentions_code(&lower, "cr") || CREDIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return amount.abs();
    }
    if mentions_code(&lower, "bp")
        || mentions_code(&lower, "dd")
        || DEBIT_MARKERS.iter().any(|m| lower.contains(m))
    {
        return -amount.abs();
    }
    amount
}

/// Collapse whitespace, fix the `Dee` month misread and upper-case a
/// leading BP/CR code.
pub fn clean_description(description: &str) -> String {
    let collapsed = WHITESPACE.replace_all(description.trim(), " ");
    let cleaned = DEC_MISREAD.replace_all(&collapsed, "Dec").into_owned();
    let lower = cleaned.to_lowercase();
    for code in ["BP", "CR"] {
        if has_code(&lower, &code.to_lowercase()) {
            return format!("{code} {}", cleaned[code.len()..].trim());
        }
    }
    cleaned
}

/// Return a repaired copy of `txn`. `ai_corrected` is set when a field changed.
pub fn correct(rules: &CategoryRules, txn: &Transaction) -> Transaction {
    let mut out = txn.clone();

    if description_lost(&txn.description) {
        if let Some(sig) = rules.signatures.iter().find(|s| s.band.contains(txn.amount)) {
            debug!(amount = txn.amount, description = %sig.description, "signature correction");
            out.description = sig.description.clone();
            out.amount = sig.amount;
            out.ai_corrected = true;
            out.correction_reason = Some(format!("Matched {} pattern", sig.issuer_family));
            return out;
        }
        out.description = infer_description(txn.amount).to_string();
    }

    out.amount = correct_sign(&out.description, out.amount);
    out.description = clean_description(&out.description);

    if out.description != txn.description || out.amount != txn.amount {
        out.ai_corrected = true;
        out.correction_reason.get_or_insert_with(|| "Rule-based cleanup".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Currency;

    fn txn(description: &str, amount: f64) -> Transaction {
        Transaction::new(None, description, amount, Currency::Gbp)
    }

    #[test]
    fn test_signature_repairs_lost_description() {
        let fixed = correct(&CategoryRules::builtin(), &txn("", 28.5));
        assert_eq!(fixed.description, "BP Uber");
        assert_eq!(fixed.amount, -28.9);
        assert!(fixed.ai_corrected);
        assert_eq!(fixed.correction_reason.as_deref(), Some("Matched hsbc_uk pattern"));
    }

    #[test]
    fn test_signatures_leave_described_rows_alone() {
        let original = txn("Uber Trip", -28.5);
        let fixed = correct(&CategoryRules::builtin(), &original);
        assert_eq!(fixed, original);
        assert!(!fixed.ai_corrected);
    }

    #[test]
    fn test_inferred_description_when_no_signature() {
        let fixed = correct(&CategoryRules::builtin(), &txn("  ", -75.0));
        assert_eq!(fixed.description, "BP Debit");
        assert_eq!(fixed.amount, -75.0);
        assert!(fixed.ai_corrected);
    }

    #[test]
    fn test_sign_follows_wording() {
        assert_eq!(correct_sign("CR Cheque Deposit", -425.23), 425.23);
        assert_eq!(correct_sign("ATM WITHDRAWAL", 2000.0), -2000.0);
        assert_eq!(correct_sign("DD BRITISH GAS", 200.0), -200.0);
        assert_eq!(correct_sign("PAYMENT - THANK YOU", 15_000.0), 15_000.0);
        assert_eq!(correct_sign("Grocery Store", -45.0), -45.0);
    }

    #[test]
    fn test_sign_code_mid_description() {
        assert_eq!(correct_sign("FASTER PMT CR ACME LTD", -310.0), 310.0);
        assert_eq!(correct_sign("01 Dec BP Costa", 4.2), -4.2);
        // letters inside a word are not a code
        assert_eq!(correct_sign("MCR TRAVEL", -60.0), -60.0);
        assert_eq!(correct_sign("ACR BP", 12.0), -12.0);
    }

    #[test]
    fn test_clean_description() {
        assert_eq!(clean_description("  bp   Costa   Coffee "), "BP Costa Coffee");
        assert_eq!(clean_description("cr Transfer 01 Dee 23"), "CR Transfer 01 Dec 23");
        assert_eq!(clean_description("Deep Clean Services"), "Deep Clean Services");
    }

    #[test]
    fn test_clean_row_is_unchanged() {
        let original = txn("Grocery Store", -45.0);
        let fixed = correct(&CategoryRules::builtin(), &original);
        assert!(!fixed.ai_corrected);
        assert_eq!(fixed.correction_reason, None);
    }
}
