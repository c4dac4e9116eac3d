//! Grammar dispatch: classify the text, try grammars best guess first, and
//! never fail.

use tally_core::{Issuer, ParseResult};
use tracing::{debug, info, warn};

use crate::classifier::{classify_document, detect_issuer, grammar_chain};
use crate::parsers::parser_for;
use crate::types::{Grammar, ParseContext};

/// Per-call parse options.
#[derive(Debug, Clone, Default)]
pub struct ParseRequest {
    /// Skip issuer detection; `Unknown` means "detect".
    pub bank_override: Option<Issuer>,
    pub ctx: ParseContext,
}

impl ParseRequest {
    pub fn new(ctx: ParseContext) -> Self {
        Self {
            bank_override: None,
            ctx,
        }
    }

    pub fn with_bank(mut self, issuer: Issuer) -> Self {
        self.bank_override = Some(issuer);
        self
    }
}

/// Turn raw statement text into a [`ParseResult`].
///
/// Grammars are tried in [`grammar_chain`] order. A grammar that errors is
/// logged and treated as declined; one that parses but finds no rows is
/// remembered and only returned if nothing better turns up.
pub fn parse_text(text: &str, request: &ParseRequest) -> ParseResult {
    if text.trim().is_empty() {
        return ParseResult::empty(text);
    }

    let issuer = request
        .bank_override
        .filter(|i| *i != Issuer::Unknown)
        .unwrap_or_else(|| detect_issuer(text));
    let kind = classify_document(text);
    let chain = grammar_chain(issuer, kind, text);
    debug!(?issuer, ?kind, ?chain, "grammar chain");

    let mut fallback: Option<(Grammar, ParseResult)> = None;
    for grammar in chain {
        match parser_for(grammar).parse(text, &request.ctx) {
            Ok(result) if !result.is_empty() => {
                info!(
                    ?grammar,
                    transactions = result.transactions.len(),
                    "statement parsed"
                );
                return finish(result, grammar, issuer, &request.ctx);
            }
            Ok(result) => {
                debug!(?grammar, "grammar found no transactions");
                fallback.get_or_insert((grammar, result));
            }
            Err(err) => warn!(?grammar, error = %err, "grammar declined"),
        }
    }

    match fallback {
        Some((grammar, result)) => finish(result, grammar, issuer, &request.ctx),
        None => {
            let mut empty = ParseResult::empty(text);
            empty.detected_bank = issuer;
            empty.bank_name = issuer.display_name().to_string();
            empty
        }
    }
}

fn finish(
    mut result: ParseResult,
    grammar: Grammar,
    issuer: Issuer,
    ctx: &ParseContext,
) -> ParseResult {
    result.detected_bank = issuer;
    if grammar == Grammar::Generic && issuer != Issuer::Unknown {
        result.bank_name = issuer.display_name().to_string();
    }
    if let Some(source) = &ctx.source_name {
        for txn in &mut result.transactions {
            txn.source_file = Some(source.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_empty_result() {
        let result = parse_text("   \n", &ParseRequest::default());
        assert!(result.is_empty());
        assert_eq!(result.detected_bank, Issuer::Unknown);
    }

    #[test]
    fn test_generic_rows_carry_issuer_name() {
        let text = "Bank of the Philippine Islands\n\
            Opening balance 1,000.00\n\
            15 Jun 2024  Grocery Store   45.00   955.00\n";
        let result = parse_text(text, &ParseRequest::default());
        assert_eq!(result.detected_bank, Issuer::Bpi);
        assert_eq!(result.bank_name, "Bank of the Philippine Islands");
        assert_eq!(result.transactions.len(), 1);
    }

    #[test]
    fn test_override_and_source_name() {
        let ctx = ParseContext::with_year(2024).with_source("june.pdf");
        let request = ParseRequest::new(ctx).with_bank(Issuer::Citibank);
        let result = parse_text("15 Jun  Coffee   3.50   96.50\n", &request);
        assert_eq!(result.detected_bank, Issuer::Citibank);
        assert_eq!(result.transactions[0].source_file.as_deref(), Some("june.pdf"));
    }
}
