//! Format/bank classification of raw OCR text.
//!
//! Two levels: which issuer printed the document, then whether it is a
//! statement or a till receipt. Both are ordered rule tables so precedence
//! lives in data and each rule can be tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use tally_core::Issuer;
use tracing::debug;

use crate::types::{DocumentKind, Grammar, HsbcVariant};

/// Ordered issuer rules; the first rule with any matching pattern wins.
const ISSUER_RULES: &[(Issuer, &[&str])] = &[
    (Issuer::Hsbc, &[r"hsbc"]),
    (
        Issuer::Bdo,
        &[
            r"bdo unibank",
            r"banco de oro",
            r"(?s)transaction date.*value date",
            r"(?s)value date.*transaction date",
        ],
    ),
    (Issuer::Bpi, &[r"bank of the philippine islands", r"bpi"]),
    (Issuer::Metrobank, &[r"metrobank", r"metropolitan bank", r"metro bank"]),
    (Issuer::Landbank, &[r"land bank", r"landbank"]),
    (Issuer::SecurityBank, &[r"security bank"]),
    (Issuer::Citibank, &[r"citibank", r"citi"]),
];

static ISSUER_MATCHERS: Lazy<Vec<(Issuer, Vec<Regex>)>> = Lazy::new(|| {
    ISSUER_RULES
        .iter()
        .map(|(issuer, patterns)| {
            let compiled = patterns.iter().map(|p| Regex::new(p).unwrap()).collect();
            (*issuer, compiled)
        })
        .collect()
});

/// Identify the issuer of a statement. `Issuer::Unknown` when no rule fires.
pub fn detect_issuer(text: &str) -> Issuer {
    let lower = text.to_lowercase();
    let issuer = ISSUER_MATCHERS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&lower)))
        .map(|(issuer, _)| *issuer)
        .unwrap_or(Issuer::Unknown);
    debug!(?issuer, "detected issuer");
    issuer
}

static SORT_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}-\d{2}-\d{2}").unwrap());

/// Each entry lists phrases that must all be present to count.
const HSBC_UK_INDICATORS: &[&[&str]] = &[
    &["paid out", "paid in"],
    &["payments out", "payments in"],
    &["your statement"],
    &["sort code"],
    &["sortcode"],
    &["international bank account number"],
    &["branch identifier code"],
    &["balance brought forward"],
    &["balance carried forward"],
];

const HSBC_PH_INDICATORS: &[&[&str]] = &[
    &["credit card statement"],
    &["post date", "tran date"],
    &["hsbc gold visa"],
    &["credit limit"],
    &["minimum amount due"],
    &["payment due date"],
    &["previous balance", "new balance"],
    &["available credit"],
];

fn indicator_score(lower: &str, indicators: &[&[&str]]) -> usize {
    indicators
        .iter()
        .filter(|all| all.iter().all(|phrase| lower.contains(phrase)))
        .count()
}

/// Tell the HSBC UK current-account layout from the HSBC Philippines
/// credit card layout.
pub fn detect_hsbc_variant(text: &str) -> HsbcVariant {
    let lower = text.to_lowercase();
    let mut uk = indicator_score(&lower, HSBC_UK_INDICATORS);
    if SORT_CODE.is_match(&lower) {
        uk += 1;
    }
    let ph = indicator_score(&lower, HSBC_PH_INDICATORS);
    debug!(uk, ph, "hsbc variant scores");

    if uk > ph && uk >= 2 {
        return HsbcVariant::UkBankStatement;
    }
    if ph > uk && ph >= 2 {
        return HsbcVariant::PhilippinesCreditCard;
    }

    if lower.contains("paid out") || lower.contains("paid in") {
        HsbcVariant::UkBankStatement
    } else if lower.contains("credit card statement") || lower.contains("minimum amount due") {
        HsbcVariant::PhilippinesCreditCard
    } else {
        HsbcVariant::Unknown
    }
}

/// (pattern, weight) pairs.
const RECEIPT_INDICATORS: &[(&str, usize)] = &[
    (r"receipt|sales slip|tax invoice", 2),
    (r"(?:sub-?total|tax|amount|balance).+total", 2),
    (r"(?:cashier|terminal|register|store)\s+#?\d", 2),
    (r"\bqty\b|@|\beach\b|\bitem\b|price.+\$?\d+\.\d{2}", 1),
    (r"thank you|please come again|come again", 1),
    (r"card\s+(?:auth|number|type)|approved", 1),
];

const STATEMENT_INDICATORS: &[(&str, usize)] = &[
    (r"account statement|bank statement|statement period|statement date", 2),
    (r"opening balance|closing balance|beginning balance|ending balance", 2),
    (r"transaction history|account activity|account summary", 2),
    (r"bdo|hsbc|metrobank|landbank|bpi|security bank|citibank", 1),
    (r"(?:date|description|amount|balance).+(?:date|description|amount|balance)", 1),
];

/// Receipts are short; anything longer is treated as a statement.
const MAX_RECEIPT_LEN: usize = 2000;

static RECEIPT_MATCHERS: Lazy<Vec<(Regex, usize)>> = Lazy::new(|| compile_weighted(RECEIPT_INDICATORS));
static STATEMENT_MATCHERS: Lazy<Vec<(Regex, usize)>> =
    Lazy::new(|| compile_weighted(STATEMENT_INDICATORS));

fn compile_weighted(table: &[(&str, usize)]) -> Vec<(Regex, usize)> {
    table
        .iter()
        .map(|(p, w)| (Regex::new(p).unwrap(), *w))
        .collect()
}

/// Weighted indicator score and number of distinct indicators that fired.
fn weighted_score(lower: &str, matchers: &[(Regex, usize)]) -> (usize, usize) {
    matchers
        .iter()
        .filter(|(re, _)| re.is_match(lower))
        .fold((0, 0), |(score, hits), (_, w)| (score + w, hits + 1))
}

/// Statement or receipt. The statement reading wins ties.
pub fn classify_document(text: &str) -> DocumentKind {
    let lower = text.to_lowercase();
    let (receipt, receipt_hits) = weighted_score(&lower, &RECEIPT_MATCHERS);
    let (statement, _) = weighted_score(&lower, &STATEMENT_MATCHERS);
    debug!(receipt, statement, "document kind scores");

    if receipt_hits >= 2 && receipt > statement && lower.chars().count() < MAX_RECEIPT_LEN {
        DocumentKind::Receipt
    } else {
        DocumentKind::Statement
    }
}

/// The dedicated grammar for an issuer, if it has one.
pub fn issuer_grammar(issuer: Issuer, text: &str) -> Option<Grammar> {
    match issuer {
        Issuer::Hsbc => match detect_hsbc_variant(text) {
            HsbcVariant::UkBankStatement => Some(Grammar::HsbcUk),
            _ => Some(Grammar::HsbcPh),
        },
        Issuer::Bdo => Some(Grammar::Bdo),
        Issuer::Metrobank => Some(Grammar::Metrobank),
        Issuer::Landbank => Some(Grammar::Landbank),
        Issuer::Bpi | Issuer::SecurityBank | Issuer::Citibank | Issuer::Unknown => None,
    }
}

/// Grammars to try, best guess first. The generic statement grammar is
/// always the last resort.
pub fn grammar_chain(issuer: Issuer, kind: DocumentKind, text: &str) -> Vec<Grammar> {
    let mut chain = Vec::with_capacity(4);
    if kind == DocumentKind::Receipt {
        chain.push(Grammar::Receipt);
    }
    match issuer_grammar(issuer, text) {
        Some(Grammar::HsbcUk) => chain.extend([Grammar::HsbcUk, Grammar::HsbcPh]),
        Some(g) => chain.push(g),
        None => {}
    }
    chain.push(Grammar::Generic);
    chain
}

/// First grammar of [`grammar_chain`].
pub fn select_grammar(issuer: Issuer, kind: DocumentKind, text: &str) -> Grammar {
    grammar_chain(issuer, kind, text)
        .first()
        .copied()
        .unwrap_or(Grammar::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuer_rules_in_order() {
        assert_eq!(detect_issuer("HSBC Bank plc\nYour Statement"), Issuer::Hsbc);
        assert_eq!(detect_issuer("BDO Unibank, Inc."), Issuer::Bdo);
        assert_eq!(
            detect_issuer("Transaction Date   Value Date   Description"),
            Issuer::Bdo
        );
        assert_eq!(detect_issuer("Bank of the Philippine Islands"), Issuer::Bpi);
        assert_eq!(detect_issuer("Metropolitan Bank & Trust"), Issuer::Metrobank);
        assert_eq!(detect_issuer("LANDBANK iAccess"), Issuer::Landbank);
        assert_eq!(detect_issuer("Security Bank Corporation"), Issuer::SecurityBank);
        assert_eq!(detect_issuer("Citibank N.A."), Issuer::Citibank);
        assert_eq!(detect_issuer("Some Credit Union"), Issuer::Unknown);
    }

    #[test]
    fn test_issuer_names_match_inside_words() {
        // OCR often drops the space after a short bank name
        assert_eq!(detect_issuer("BPIFamily Savings Bank"), Issuer::Bpi);
        assert_eq!(detect_issuer("Statement from myBPI online"), Issuer::Bpi);
        assert_eq!(detect_issuer("CitiBank Rewards Card"), Issuer::Citibank);
        assert_eq!(detect_issuer("CITIPHONE BANKING 8995-9999"), Issuer::Citibank);
        assert_eq!(detect_issuer("BPI Family Savings"), Issuer::Bpi);
        assert_eq!(detect_issuer("Makati City branch"), Issuer::Unknown);
    }

    #[test]
    fn test_hsbc_wins_over_later_rules() {
        // mentions both; HSBC is earlier in the table
        assert_eq!(detect_issuer("HSBC transfer to Metrobank"), Issuer::Hsbc);
    }

    #[test]
    fn test_hsbc_uk_variant() {
        let text = "HSBC\nYour Statement\nSort Code 40-11-62\nDate Payment type and details Paid out Paid in Balance\nBALANCE BROUGHT FORWARD";
        assert_eq!(detect_hsbc_variant(text), HsbcVariant::UkBankStatement);
    }

    #[test]
    fn test_hsbc_ph_variant() {
        let text = "HSBC GOLD VISA\nCREDIT CARD STATEMENT\nPOST DATE TRAN DATE DESCRIPTION AMOUNT\nCredit Limit 100,000.00\nMinimum Amount Due";
        assert_eq!(detect_hsbc_variant(text), HsbcVariant::PhilippinesCreditCard);
    }

    #[test]
    fn test_hsbc_variant_fallbacks() {
        assert_eq!(detect_hsbc_variant("HSBC paid out"), HsbcVariant::UkBankStatement);
        assert_eq!(detect_hsbc_variant("HSBC minimum amount due"), HsbcVariant::PhilippinesCreditCard);
        assert_eq!(detect_hsbc_variant("HSBC"), HsbcVariant::Unknown);
    }

    #[test]
    fn test_receipt_detection() {
        let receipt = "SUNNY MART\nCashier #3\nMilk 2.50\nBread 3.10\nSubtotal 5.60\nTax 0.40   Total 6.00\nThank you for shopping!";
        assert_eq!(classify_document(receipt), DocumentKind::Receipt);
    }

    #[test]
    fn test_statement_wins_ties_and_defaults() {
        let statement = "Account Statement\nOpening balance 1,000.00\nTransaction History";
        assert_eq!(classify_document(statement), DocumentKind::Statement);
        assert_eq!(classify_document("hello"), DocumentKind::Statement);

        // one receipt indicator only
        let text = "Opening balance 1,000.00\n15 Jun  Grocery Store   45.00   955.00";
        assert_eq!(classify_document(text), DocumentKind::Statement);
    }

    #[test]
    fn test_grammar_chain() {
        let uk = "HSBC\nPaid out Paid in\nSort Code 40-11-62";
        assert_eq!(
            grammar_chain(Issuer::Hsbc, DocumentKind::Statement, uk),
            vec![Grammar::HsbcUk, Grammar::HsbcPh, Grammar::Generic]
        );
        assert_eq!(
            grammar_chain(Issuer::Unknown, DocumentKind::Receipt, ""),
            vec![Grammar::Receipt, Grammar::Generic]
        );
        assert_eq!(select_grammar(Issuer::Bpi, DocumentKind::Statement, ""), Grammar::Generic);
        assert_eq!(select_grammar(Issuer::Landbank, DocumentKind::Statement, ""), Grammar::Landbank);
    }
}
