//! Provider traits for fetching profile and statement data.
//!
//! This module defines the narrow boundary the pipeline depends on:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`ProfileProvider`] - Company profile records
//! - [`FinancialsProvider`] - Annual and quarterly financial statements
//! - [`FundamentalsProvider`] - Anything implementing both of the above

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    period::PeriodType,
    types::{ProfileInfo, StatementTable, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for company profile records.
#[async_trait]
pub trait ProfileProvider: DataProvider {
    /// Fetches the raw profile mapping for a symbol.
    ///
    /// Absent fields are simply missing from the mapping; an error means the
    /// provider could not be reached or does not know the symbol.
    async fn fetch_profile(&self, symbol: &Symbol) -> Result<ProfileInfo>;
}

/// Provider for financial statement tables.
#[async_trait]
pub trait FinancialsProvider: DataProvider {
    /// Fetches a statement table for a symbol.
    ///
    /// Periods are returned in the provider's native order, most recent first.
    /// An empty table is a valid answer.
    async fn fetch_financials(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable>;

    /// Fetches the annual statement table.
    async fn fetch_annual_financials(&self, symbol: &Symbol) -> Result<StatementTable> {
        self.fetch_financials(symbol, PeriodType::Annual).await
    }

    /// Fetches the quarterly statement table.
    async fn fetch_quarterly_financials(&self, symbol: &Symbol) -> Result<StatementTable> {
        self.fetch_financials(symbol, PeriodType::Quarterly).await
    }
}

/// A provider that supplies both profiles and statements.
///
/// Implemented automatically for every type implementing [`ProfileProvider`]
/// and [`FinancialsProvider`].
pub trait FundamentalsProvider: ProfileProvider + FinancialsProvider {}

impl<T: ProfileProvider + FinancialsProvider> FundamentalsProvider for T {}
