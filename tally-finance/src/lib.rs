//! tally-finance: categorization, field correction and balance
//! reconciliation for parsed statements.

pub mod category_rules;
pub mod correction;
pub mod enrich;
pub mod reconcile;
pub mod rules;

pub use category_rules::{categorize, confidence};
pub use correction::correct;
pub use enrich::{Enriched, EnrichmentStats, enrich, enrich_transaction};
pub use reconcile::{DEFAULT_TOLERANCE, Reconciliation, reconcile};
pub use rules::{
    AmountBand, CategoryRules, KeywordRule, LearnedPatterns, LearnedState, ModelArtifacts,
    RulesError, RulesSource, RulesStatus, SignFilter, SignatureRule, load_rules,
};
