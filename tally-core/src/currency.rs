//! Statement-wide currency detection

use once_cell::sync::Lazy;
use regex::Regex;

use crate::finance::Currency;

static AMOUNT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)amount\s*\(\s*([a-z]{3})\s*\)").unwrap());
static CURRENCY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(USD|EUR|GBP|JPY|ILS|PHP)\b").unwrap());
static PESO_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d[\d,]*\.?\d*\s*p\b").unwrap());

/// Detect the currency a statement is written in.
///
/// Order: an explicit `Amount (XXX)` column header, then the most frequent
/// symbol/code (ties go to the earlier entry of [`Currency::ALL`]), then
/// the `123.45 P` peso suffix convention, then USD.
pub fn detect_currency(text: &str) -> Currency {
    detect_currency_or(text, Currency::Usd)
}

/// [`detect_currency`] with an issuer-specific fallback for text that
/// carries no currency evidence at all.
pub fn detect_currency_or(text: &str, fallback: Currency) -> Currency {
    if let Some(code) = AMOUNT_HEADER
        .captures(text)
        .and_then(|caps| Currency::from_code(&caps[1]))
    {
        return code;
    }

    let mut best: Option<(Currency, usize)> = None;
    for currency in Currency::ALL {
        let symbols = text.matches(currency.symbol()).count();
        let codes = CURRENCY_CODE
            .find_iter(text)
            .filter(|m| m.as_str() == currency.code())
            .count();
        let count = symbols + codes;
        if count > 0 && best.is_none_or(|(_, n)| count > n) {
            best = Some((currency, count));
        }
    }
    if let Some((currency, _)) = best {
        return currency;
    }

    if PESO_SUFFIX.find_iter(text).count() > 3 {
        return Currency::Php;
    }

    fallback
}
