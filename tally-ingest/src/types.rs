use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ANY_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

/// Statement vs receipt, decided before a grammar is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Statement,
    Receipt,
}

/// HSBC ships two unrelated layouts under one brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HsbcVariant {
    UkBankStatement,
    PhilippinesCreditCard,
    Unknown,
}

/// The grammar parsers this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grammar {
    HsbcUk,
    HsbcPh,
    Bdo,
    Metrobank,
    Landbank,
    Receipt,
    Generic,
}

/// Per-call parsing context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
    /// Year for rows that only print day + month
    pub statement_year: Option<i32>,
    /// Name of the uploaded file, copied onto each transaction
    pub source_name: Option<String>,
}

impl ParseContext {
    pub fn with_year(year: i32) -> Self {
        Self {
            statement_year: Some(year),
            source_name: None,
        }
    }

    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Explicit year, else the first `20xx` in the text, else the clock.
    pub fn resolve_year(&self, text: &str) -> i32 {
        self.statement_year
            .or_else(|| first_year(text))
            .unwrap_or_else(|| Local::now().year())
    }
}

/// First `20xx` token in `text`.
pub fn first_year(text: &str) -> Option<i32> {
    ANY_YEAR
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}
