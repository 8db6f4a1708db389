//! In-memory provider implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::trace;

use crate::{
    DataError, DataProvider, FinancialsProvider, PeriodType, ProfileInfo, ProfileProvider,
    Result, StatementTable, Symbol,
};

/// Seeded data for one symbol.
#[derive(Debug, Clone, Default)]
struct SymbolData {
    profile: Option<std::result::Result<ProfileInfo, DataError>>,
    annual: Option<std::result::Result<StatementTable, DataError>>,
    quarterly: Option<std::result::Result<StatementTable, DataError>>,
}

/// Provider serving pre-seeded profiles and statements.
///
/// Unknown symbols answer [`DataError::SymbolNotFound`]. A seeded symbol with
/// no statement of a given period type answers an empty table, the same way a
/// live provider does for companies that do not report that period.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    symbols: HashMap<Symbol, SymbolData>,
}

impl InMemoryProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the profile mapping for a symbol.
    #[must_use]
    pub fn with_profile(mut self, symbol: impl Into<Symbol>, profile: ProfileInfo) -> Self {
        self.entry(symbol).profile = Some(Ok(profile));
        self
    }

    /// Seed a statement table for a symbol.
    #[must_use]
    pub fn with_financials(
        mut self,
        symbol: impl Into<Symbol>,
        period_type: PeriodType,
        table: StatementTable,
    ) -> Self {
        let entry = self.entry(symbol);
        match period_type {
            PeriodType::Annual => entry.annual = Some(Ok(table)),
            PeriodType::Quarterly => entry.quarterly = Some(Ok(table)),
        }
        self
    }

    /// Make the profile call for a symbol fail with the given error.
    #[must_use]
    pub fn with_profile_error(mut self, symbol: impl Into<Symbol>, error: DataError) -> Self {
        self.entry(symbol).profile = Some(Err(error));
        self
    }

    /// Make a statement call for a symbol fail with the given error.
    #[must_use]
    pub fn with_financials_error(
        mut self,
        symbol: impl Into<Symbol>,
        period_type: PeriodType,
        error: DataError,
    ) -> Self {
        let entry = self.entry(symbol);
        match period_type {
            PeriodType::Annual => entry.annual = Some(Err(error)),
            PeriodType::Quarterly => entry.quarterly = Some(Err(error)),
        }
        self
    }

    fn entry(&mut self, symbol: impl Into<Symbol>) -> &mut SymbolData {
        self.symbols.entry(symbol.into()).or_default()
    }

    fn lookup(&self, symbol: &Symbol) -> Result<&SymbolData> {
        self.symbols
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "In-Memory"
    }

    fn description(&self) -> &str {
        "Seeded provider for tests and offline runs"
    }
}

#[async_trait]
impl ProfileProvider for InMemoryProvider {
    async fn fetch_profile(&self, symbol: &Symbol) -> Result<ProfileInfo> {
        trace!(symbol = %symbol, "InMemoryProvider: fetch_profile");
        match &self.lookup(symbol)?.profile {
            Some(result) => result.clone(),
            None => Ok(ProfileInfo::new()),
        }
    }
}

#[async_trait]
impl FinancialsProvider for InMemoryProvider {
    async fn fetch_financials(
        &self,
        symbol: &Symbol,
        period_type: PeriodType,
    ) -> Result<StatementTable> {
        trace!(symbol = %symbol, %period_type, "InMemoryProvider: fetch_financials");
        let data = self.lookup(symbol)?;
        let seeded = match period_type {
            PeriodType::Annual => &data.annual,
            PeriodType::Quarterly => &data.quarterly,
        };
        match seeded {
            Some(result) => result.clone(),
            None => Ok(StatementTable::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn annual() -> StatementTable {
        StatementTable::new(vec![NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()])
            .with_line_item("Net Income", vec![Some(10.0)])
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let provider = InMemoryProvider::new();
        let symbol = Symbol::new("FAKE$$");

        let profile = provider.fetch_profile(&symbol).await;
        assert!(matches!(profile, Err(DataError::SymbolNotFound(_))));

        let annual = provider.fetch_annual_financials(&symbol).await;
        assert!(matches!(annual, Err(DataError::SymbolNotFound(_))));
    }

    #[tokio::test]
    async fn test_seeded_data_round_trips() {
        let provider = InMemoryProvider::new()
            .with_profile("aapl", ProfileInfo::new().with("longName", "Apple Inc."))
            .with_financials("AAPL", PeriodType::Annual, annual());
        let symbol = Symbol::new("AAPL");

        let profile = provider.fetch_profile(&symbol).await.unwrap();
        assert_eq!(profile.get_str("longName").as_deref(), Some("Apple Inc."));

        let table = provider.fetch_annual_financials(&symbol).await.unwrap();
        assert_eq!(table, annual());

        let quarterly = provider.fetch_quarterly_financials(&symbol).await.unwrap();
        assert!(quarterly.is_empty());
    }

    #[tokio::test]
    async fn test_seeded_errors() {
        let provider = InMemoryProvider::new()
            .with_profile_error("MSFT", DataError::Network("timeout".to_string()))
            .with_financials_error(
                "MSFT",
                PeriodType::Quarterly,
                DataError::Parse("bad json".to_string()),
            );
        let symbol = Symbol::new("MSFT");

        assert!(matches!(
            provider.fetch_profile(&symbol).await,
            Err(DataError::Network(_))
        ));
        assert!(matches!(
            provider.fetch_quarterly_financials(&symbol).await,
            Err(DataError::Parse(_))
        ));
        assert!(provider.fetch_annual_financials(&symbol).await.unwrap().is_empty());
    }
}
