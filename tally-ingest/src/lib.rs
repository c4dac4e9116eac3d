//! tally-ingest: bank/format classification and the grammar parsers that turn
//! recognized statement text into transactions.

pub mod classifier;
pub mod dispatch;
pub mod grammar;
pub mod parsers;
pub mod summary;
pub mod types;

pub use classifier::{classify_document, detect_hsbc_variant, detect_issuer, select_grammar};
pub use dispatch::{ParseRequest, parse_text};
pub use grammar::StatementParser;
pub use parsers::parser_for;
pub use types::{DocumentKind, Grammar, HsbcVariant, ParseContext};
