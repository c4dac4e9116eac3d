//! Per-issuer grammar parsers.

pub mod bdo;
pub mod generic;
pub mod hsbc_ph;
pub mod hsbc_uk;
pub mod landbank;
pub mod metrobank;
pub mod receipt;

use crate::grammar::StatementParser;
use crate::types::Grammar;

pub use bdo::{BdoParser, parse_bdo_text};
pub use generic::{GenericParser, parse_generic_text};
pub use hsbc_ph::{HsbcPhParser, parse_hsbc_ph_text};
pub use hsbc_uk::{HsbcUkParser, parse_hsbc_uk_text};
pub use landbank::{LandbankParser, parse_landbank_text};
pub use metrobank::{MetrobankParser, parse_metrobank_text};
pub use receipt::{ReceiptParser, parse_receipt_text};

/// The parser implementing `grammar`.
pub fn parser_for(grammar: Grammar) -> &'static dyn StatementParser {
    match grammar {
        Grammar::HsbcUk => &HsbcUkParser,
        Grammar::HsbcPh => &HsbcPhParser,
        Grammar::Bdo => &BdoParser,
        Grammar::Metrobank => &MetrobankParser,
        Grammar::Landbank => &LandbankParser,
        Grammar::Receipt => &ReceiptParser,
        Grammar::Generic => &GenericParser,
    }
}
