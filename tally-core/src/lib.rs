//! tally-core: transaction model and the leaf normalizers (amounts,
//! currencies, dates, string similarity) shared by every statement parser.

pub mod amount;
pub mod currency;
pub mod date;
pub mod finance;
pub mod similarity;
pub mod statement;

pub use amount::{AmountToken, amounts_in, find_amounts, parse_amount};
pub use currency::{detect_currency, detect_currency_or};
pub use date::{parse_date, parse_date_with_year};
pub use finance::{Category, Currency, Transaction};
pub use similarity::{levenshtein, similarity};
pub use statement::{AccountDetails, Issuer, ParseResult, StatementSummary};
