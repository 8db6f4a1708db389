//! Financial normalizer and trailing-twelve-month (TTM) synthesizer.
//!
//! The annual statement is transposed so each fiscal period becomes a row.
//! A synthesized TTM row is put in front of the annual rows:
//!
//! | Full_Date  | Year_Index | metrics...                           |
//! |------------|------------|--------------------------------------|
//! | TTM        | 0          | sum of the first four quarters       |
//! | 2024-12-31 | 1          | annual values, provider order        |
//! | 2023-12-31 | 2          | ...                                  |
//!
//! Only metrics present in the annual statement appear in the frame. When
//! fewer than four quarters are available every TTM metric is null. A metric
//! the quarterly statement does not report is null in the TTM row as well.

use polars::prelude::*;
use pulse_core::{FinancialsProvider, ProfileInfo, StatementTable, Symbol};
use tracing::{debug, warn};

use crate::columns::{CURRENCY, FINANCIAL_CURRENCY, FULL_DATE, TICKER, TTM_LABEL, YEAR_INDEX};
use crate::error::{ExtractionFailure, FailureReason};

/// Number of quarters summed into the TTM row.
pub const TTM_QUARTERS: usize = 4;

/// Currency metadata attached to every financial row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// Trading currency.
    pub currency: String,
    /// Reporting currency of the statements.
    pub financial_currency: String,
}

impl CurrencyInfo {
    /// Reads both currencies from a profile mapping, defaulting to `"Unknown"`.
    #[must_use]
    pub fn from_profile(info: &ProfileInfo) -> Self {
        Self {
            currency: info.currency(),
            financial_currency: info.financial_currency(),
        }
    }

    /// Both currencies unknown.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            currency: ProfileInfo::UNKNOWN_CURRENCY.to_string(),
            financial_currency: ProfileInfo::UNKNOWN_CURRENCY.to_string(),
        }
    }
}

/// How the TTM row was filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtmStatus {
    /// Summed from the first [`TTM_QUARTERS`] quarterly periods.
    Computed,
    /// Too few quarters; every TTM metric is null.
    Unavailable {
        /// Number of quarterly periods the provider returned.
        quarters_available: usize,
    },
}

/// A ticker's normalized financial table.
#[derive(Clone, Debug)]
pub struct FinancialExtract {
    /// TTM row followed by annual rows.
    pub frame: DataFrame,
    /// Whether the TTM metrics were computed.
    pub ttm: TtmStatus,
}

/// Sums the present values among the first [`TTM_QUARTERS`]; missing cells
/// count as zero, so a line item with no present value sums to `0.0`.
fn sum_quarters(values: &[Option<f64>]) -> f64 {
    values.iter().take(TTM_QUARTERS).flatten().sum()
}

/// Computes the TTM value of every annual line item, in annual order.
fn ttm_values(
    annual: &StatementTable,
    quarterly: &StatementTable,
) -> (Vec<Option<f64>>, TtmStatus) {
    let quarters_available = if quarterly.is_empty() {
        0
    } else {
        quarterly.period_count()
    };

    if quarters_available < TTM_QUARTERS {
        let values = vec![None; annual.line_items().len()];
        return (values, TtmStatus::Unavailable { quarters_available });
    }

    let values = annual
        .line_items()
        .iter()
        .map(|item| {
            quarterly
                .line_item(&item.name)
                .map(|q| sum_quarters(&q.values))
        })
        .collect();
    (values, TtmStatus::Computed)
}

/// Reshapes one ticker's statements into its financial frame.
///
/// Columns are `Ticker, Full_Date, Year_Index, Currency, Financial_Currency`
/// followed by the annual line items in provider order. An empty annual
/// statement is a financial-side failure.
pub fn normalize_financials(
    symbol: &Symbol,
    annual: &StatementTable,
    quarterly: &StatementTable,
    currencies: &CurrencyInfo,
) -> std::result::Result<FinancialExtract, ExtractionFailure> {
    if annual.is_empty() {
        return Err(ExtractionFailure::financial(
            symbol,
            FailureReason::NoAnnualData,
        ));
    }

    let rows = annual.period_count() + 1;
    let (ttm, status) = ttm_values(annual, quarterly);

    let full_dates: Vec<String> = std::iter::once(TTM_LABEL.to_string())
        .chain(
            annual
                .periods()
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string()),
        )
        .collect();
    let year_index: Vec<i64> = (0..rows as i64).collect();

    let mut columns = vec![
        Column::new(TICKER.into(), vec![symbol.as_str(); rows]),
        Column::new(FULL_DATE.into(), full_dates),
        Column::new(YEAR_INDEX.into(), year_index),
        Column::new(CURRENCY.into(), vec![currencies.currency.as_str(); rows]),
        Column::new(
            FINANCIAL_CURRENCY.into(),
            vec![currencies.financial_currency.as_str(); rows],
        ),
    ];

    for (item, ttm_value) in annual.line_items().iter().zip(ttm) {
        let values: Vec<Option<f64>> = std::iter::once(ttm_value)
            .chain(item.values.iter().copied())
            .collect();
        columns.push(Column::new(item.name.as_str().into(), values));
    }

    let frame = DataFrame::new(columns).map_err(|e| {
        ExtractionFailure::financial(symbol, FailureReason::Transform(e.to_string()))
    })?;

    Ok(FinancialExtract { frame, ttm: status })
}

/// Fetches both statements for a ticker and normalizes them.
///
/// Any provider error becomes a financial-side failure; the quarterly
/// statement is only requested once annual data is known to exist.
pub async fn extract_financials<P>(
    provider: &P,
    symbol: &Symbol,
    currencies: &CurrencyInfo,
) -> std::result::Result<FinancialExtract, ExtractionFailure>
where
    P: FinancialsProvider + ?Sized,
{
    let annual = provider
        .fetch_annual_financials(symbol)
        .await
        .map_err(|e| ExtractionFailure::financial(symbol, e))?;

    if annual.is_empty() {
        debug!(symbol = %symbol, "No annual financials returned");
        return Err(ExtractionFailure::financial(
            symbol,
            FailureReason::NoAnnualData,
        ));
    }

    let quarterly = provider
        .fetch_quarterly_financials(symbol)
        .await
        .map_err(|e| ExtractionFailure::financial(symbol, e))?;

    let extract = normalize_financials(symbol, &annual, &quarterly, currencies)?;
    if let TtmStatus::Unavailable { quarters_available } = extract.ttm {
        warn!(
            symbol = %symbol,
            quarters_available,
            "Fewer than {TTM_QUARTERS} quarters available, TTM row left empty"
        );
    }
    Ok(extract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pulse_core::{DataError, InMemoryProvider, PeriodType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn annual() -> StatementTable {
        StatementTable::new(vec![date(2024, 12, 31), date(2023, 12, 31), date(2022, 12, 31)])
            .with_line_item("Total Revenue", vec![Some(350.0), Some(307.0), Some(282.0)])
            .unwrap()
            .with_line_item("Net Income", vec![Some(100.0), Some(74.0), Some(60.0)])
            .unwrap()
            .with_line_item("Normalized EBITDA", vec![Some(130.0), None, Some(90.0)])
            .unwrap()
    }

    fn quarterly(periods: usize) -> StatementTable {
        let dates = (0..periods)
            .map(|i| date(2025, 6, 30) - chrono::Days::new(91 * i as u64))
            .collect();
        let revenue = (0..periods).map(|i| Some(90.0 + i as f64)).collect();
        let income = (0..periods).map(|i| Some(25.0 - i as f64)).collect();
        let buybacks = (0..periods).map(|_| Some(-5.0)).collect();
        StatementTable::new(dates)
            .with_line_item("Total Revenue", revenue)
            .unwrap()
            .with_line_item("Net Income", income)
            .unwrap()
            .with_line_item("Repurchase Of Capital Stock", buybacks)
            .unwrap()
    }

    fn usd() -> CurrencyInfo {
        CurrencyInfo {
            currency: "USD".to_string(),
            financial_currency: "USD".to_string(),
        }
    }

    fn f64_at(df: &DataFrame, column: &str, row: usize) -> Option<f64> {
        df.column(column).unwrap().f64().unwrap().get(row)
    }

    #[test]
    fn test_ttm_row_sums_first_four_quarters() {
        let symbol = Symbol::new("GOOGL");
        let extract = normalize_financials(&symbol, &annual(), &quarterly(6), &usd()).unwrap();
        let df = &extract.frame;

        assert_eq!(extract.ttm, TtmStatus::Computed);
        assert_eq!(df.height(), 4);

        let dates = df.column(FULL_DATE).unwrap().str().unwrap();
        assert_eq!(dates.get(0), Some(TTM_LABEL));
        assert_eq!(dates.get(1), Some("2024-12-31"));
        assert_eq!(dates.get(3), Some("2022-12-31"));

        let index = df.column(YEAR_INDEX).unwrap().i64().unwrap();
        let index: Vec<Option<i64>> = index.into_iter().collect();
        assert_eq!(index, vec![Some(0), Some(1), Some(2), Some(3)]);

        // 90 + 91 + 92 + 93 and 25 + 24 + 23 + 22
        assert_eq!(f64_at(df, "Total Revenue", 0), Some(366.0));
        assert_eq!(f64_at(df, "Net Income", 0), Some(94.0));
        assert_eq!(f64_at(df, "Total Revenue", 1), Some(350.0));
    }

    #[test]
    fn test_ttm_drops_quarterly_only_metrics() {
        let symbol = Symbol::new("GOOGL");
        let extract = normalize_financials(&symbol, &annual(), &quarterly(4), &usd()).unwrap();
        let df = &extract.frame;

        assert!(df.column("Repurchase Of Capital Stock").is_err());
        // annual-only metric stays null in the TTM row
        assert_eq!(f64_at(df, "Normalized EBITDA", 0), None);
        assert_eq!(f64_at(df, "Normalized EBITDA", 1), Some(130.0));
        assert_eq!(f64_at(df, "Normalized EBITDA", 2), None);
    }

    #[test]
    fn test_insufficient_quarters_leave_ttm_null() {
        let symbol = Symbol::new("ARTNA");
        for periods in [0, 3] {
            let extract =
                normalize_financials(&symbol, &annual(), &quarterly(periods), &usd()).unwrap();
            let df = &extract.frame;

            assert_eq!(
                extract.ttm,
                TtmStatus::Unavailable {
                    quarters_available: periods
                }
            );
            for metric in ["Total Revenue", "Net Income", "Normalized EBITDA"] {
                assert_eq!(f64_at(df, metric, 0), None, "{metric} with {periods} quarters");
            }
            let currency = df.column(CURRENCY).unwrap().str().unwrap();
            assert_eq!(currency.get(0), Some("USD"));
        }
    }

    #[test]
    fn test_missing_quarter_values_count_as_zero() {
        let quarterly = StatementTable::new(vec![
            date(2025, 3, 31),
            date(2024, 12, 31),
            date(2024, 9, 30),
            date(2024, 6, 30),
        ])
        .with_line_item("Total Revenue", vec![Some(10.0), None, Some(12.0), Some(13.0)])
        .unwrap()
        .with_line_item("Net Income", vec![None, None, None, None])
        .unwrap();

        let extract =
            normalize_financials(&Symbol::new("X"), &annual(), &quarterly, &usd()).unwrap();
        assert_eq!(f64_at(&extract.frame, "Total Revenue", 0), Some(35.0));
        assert_eq!(f64_at(&extract.frame, "Net Income", 0), Some(0.0));
        // not reported quarterly at all
        assert_eq!(f64_at(&extract.frame, "Normalized EBITDA", 0), None);
    }

    #[test]
    fn test_short_quarterly_rows_do_not_panic() {
        let quarterly: StatementTable = serde_json::from_value(serde_json::json!({
            "periods": ["2025-03-31", "2024-12-31", "2024-09-30", "2024-06-30"],
            "line_items": [{"name": "Total Revenue", "values": [10.0, 11.0]}]
        }))
        .unwrap();

        let extract =
            normalize_financials(&Symbol::new("X"), &annual(), &quarterly, &usd()).unwrap();
        assert_eq!(extract.ttm, TtmStatus::Computed);
        assert_eq!(f64_at(&extract.frame, "Total Revenue", 0), Some(21.0));
    }

    #[test]
    fn test_empty_annual_is_failure() {
        let symbol = Symbol::new("FAKE$$");
        let failure =
            normalize_financials(&symbol, &StatementTable::empty(), &quarterly(4), &usd())
                .unwrap_err();
        assert_eq!(failure.reason, FailureReason::NoAnnualData);
        assert_eq!(failure.side, crate::error::FailureSide::Financial);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let symbol = Symbol::new("GOOGL");
        let first = normalize_financials(&symbol, &annual(), &quarterly(5), &usd()).unwrap();
        let second = normalize_financials(&symbol, &annual(), &quarterly(5), &usd()).unwrap();
        assert!(first.frame.equals_missing(&second.frame));
    }

    #[tokio::test]
    async fn test_extract_financials_maps_provider_errors() {
        let provider = InMemoryProvider::new()
            .with_financials("AAPL", PeriodType::Annual, annual())
            .with_financials_error(
                "AAPL",
                PeriodType::Quarterly,
                DataError::Network("reset".to_string()),
            );

        let failure = extract_financials(&provider, &Symbol::new("AAPL"), &usd())
            .await
            .unwrap_err();
        assert!(matches!(failure.reason, FailureReason::Provider(DataError::Network(_))));

        let failure = extract_financials(&provider, &Symbol::new("FAKE$$"), &usd())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.reason,
            FailureReason::Provider(DataError::SymbolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_financials_success() {
        let provider = InMemoryProvider::new()
            .with_financials("MSFT", PeriodType::Annual, annual())
            .with_financials("MSFT", PeriodType::Quarterly, quarterly(4));

        let extract = extract_financials(&provider, &Symbol::new("msft"), &CurrencyInfo::unknown())
            .await
            .unwrap();
        assert_eq!(extract.ttm, TtmStatus::Computed);
        let currency = extract.frame.column(FINANCIAL_CURRENCY).unwrap().str().unwrap();
        assert_eq!(currency.get(2), Some("Unknown"));
    }
}
