//! Reporting period definitions for financial statements.

use serde::{Deserialize, Serialize};

/// Period type for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

impl PeriodType {
    /// Prefix the Yahoo-style time series API puts in front of line-item keys.
    #[must_use]
    pub const fn series_prefix(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Annual => write!(f, "annual"),
            Self::Quarterly => write!(f, "quarterly"),
        }
    }
}
