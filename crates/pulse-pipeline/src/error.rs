//! Error types for the extraction pipeline.
//!
//! Two layers: [`ExtractionFailure`] is a per-ticker outcome that never aborts
//! a run, [`PipelineError`] is a run-level or export-level error.

use polars::prelude::PolarsError;
use pulse_core::{DataError, Symbol};
use rust_xlsxwriter::XlsxError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which normalizer a per-ticker failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSide {
    /// Profile extraction.
    Profile,
    /// Financial statement extraction.
    Financial,
}

impl fmt::Display for FailureSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Financial => write!(f, "financial"),
        }
    }
}

/// Why a ticker produced no usable row on one side.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The provider call failed.
    #[error(transparent)]
    Provider(#[from] DataError),

    /// The provider answered but the profile carried none of the expected fields.
    #[error("no profile information returned")]
    NoProfileData,

    /// The provider returned no annual statement periods.
    #[error("no annual financial data returned")]
    NoAnnualData,

    /// The fetched data could not be reshaped into a table.
    #[error("could not build table: {0}")]
    Transform(String),
}

/// A per-ticker failure, tagged with the side it came from.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{side} data unavailable for {symbol}: {reason}")]
pub struct ExtractionFailure {
    /// The ticker that failed.
    pub symbol: Symbol,
    /// Which normalizer failed.
    pub side: FailureSide,
    /// The underlying cause.
    pub reason: FailureReason,
}

impl ExtractionFailure {
    /// Creates a profile-side failure.
    #[must_use]
    pub fn profile(symbol: &Symbol, reason: impl Into<FailureReason>) -> Self {
        Self {
            symbol: symbol.clone(),
            side: FailureSide::Profile,
            reason: reason.into(),
        }
    }

    /// Creates a financial-side failure.
    #[must_use]
    pub fn financial(symbol: &Symbol, reason: impl Into<FailureReason>) -> Self {
        Self {
            symbol: symbol.clone(),
            side: FailureSide::Financial,
            reason: reason.into(),
        }
    }
}

/// Run-level and export-level errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A data frame operation failed.
    #[error("Table operation failed: {0}")]
    Polars(#[from] PolarsError),

    /// The spreadsheet writer failed.
    #[error("Spreadsheet export failed: {0}")]
    Export(#[from] XlsxError),

    /// The table does not fit in a worksheet.
    #[error("Table too large for a worksheet: {0}")]
    TableTooLarge(String),

    /// Neither profile nor financial data was usable for any ticker.
    #[error("No usable data was extracted for any ticker")]
    NoUsableData,
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = ExtractionFailure::financial(
            &Symbol::new("FAKE$$"),
            DataError::SymbolNotFound("FAKE$$".to_string()),
        );
        assert_eq!(
            failure.to_string(),
            "financial data unavailable for FAKE$$: Symbol not found: FAKE$$"
        );

        let failure = ExtractionFailure::profile(&Symbol::new("abc"), FailureReason::NoProfileData);
        assert_eq!(failure.side, FailureSide::Profile);
        assert_eq!(
            failure.to_string(),
            "profile data unavailable for ABC: no profile information returned"
        );
    }
}
