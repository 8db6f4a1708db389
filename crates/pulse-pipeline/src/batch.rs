//! Sequential per-ticker processing.
//!
//! Tickers are handled one at a time, in submission order, and grouped into
//! batches of [`ExtractOptions::batch_size`]. A failing ticker is recorded and
//! processing moves on; nothing short of a panic aborts the loop.

use polars::prelude::{Column, DataFrame, PolarsResult};
use pulse_core::{FundamentalsProvider, Symbol};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ExtractionFailure;
use crate::financials::{CurrencyInfo, TtmStatus, extract_financials};
use crate::merge::{POSITION, stack_frames};
use crate::profile::{ProfileRow, normalize_profile, profiles_to_frame};
use crate::session::Notice;

/// Default number of tickers per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Tunables for one extraction run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Tickers per batch. Zero is treated as one.
    pub batch_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ExtractOptions {
    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Progress snapshot, reported after each ticker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Current batch, counted from 1.
    pub batch: usize,
    /// Number of batches in the run.
    pub batches: usize,
    /// Tickers finished so far.
    pub processed: usize,
    /// Tickers in the run.
    pub total: usize,
    /// The ticker just finished.
    pub symbol: Option<Symbol>,
}

impl Progress {
    /// Completed fraction in `0.0..=1.0`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

/// Everything one batch of tickers produced.
#[derive(Clone, Debug, Default)]
pub struct TickerBatch {
    /// Batch number, counted from 1.
    pub index: usize,
    /// Tickers in this batch, in submission order.
    pub symbols: Vec<Symbol>,
    /// Successful profile rows, keyed by submission position.
    pub profiles: Vec<(usize, ProfileRow)>,
    /// Successful financial frames, one per ticker, keyed by submission position.
    pub financials: Vec<(usize, DataFrame)>,
    /// Per-ticker failures.
    pub failures: Vec<ExtractionFailure>,
    /// Per-ticker notices.
    pub notices: Vec<Notice>,
}

impl TickerBatch {
    fn new(index: usize, symbols: &[Symbol]) -> Self {
        Self {
            index,
            symbols: symbols.to_vec(),
            ..Self::default()
        }
    }

    /// Profile rows of this batch as a table.
    pub fn profile_frame(&self) -> PolarsResult<DataFrame> {
        positioned_profiles(&self.profiles)
    }

    /// Financial frames of this batch stacked into one table.
    pub fn financial_frame(&self) -> PolarsResult<DataFrame> {
        positioned_financials(&self.financials)
    }
}

/// Profile table with a [`POSITION`] column, so a ticker submitted twice
/// joins each of its profile rows to one financial frame only.
fn positioned_profiles<'a, I>(rows: I) -> PolarsResult<DataFrame>
where
    I: IntoIterator<Item = &'a (usize, ProfileRow)>,
{
    let (positions, rows): (Vec<u64>, Vec<ProfileRow>) = rows
        .into_iter()
        .map(|(position, row)| (*position as u64, row.clone()))
        .unzip();
    let mut frame = profiles_to_frame(&rows)?;
    frame.with_column(Column::new(POSITION.into(), positions))?;
    Ok(frame)
}

/// Financial frames tagged with their [`POSITION`] and stacked.
fn positioned_financials<'a, I>(frames: I) -> PolarsResult<DataFrame>
where
    I: IntoIterator<Item = &'a (usize, DataFrame)>,
{
    let frames = frames
        .into_iter()
        .map(|(position, frame)| -> PolarsResult<DataFrame> {
            let mut frame = frame.clone();
            let height = frame.height();
            frame.with_column(Column::new(
                POSITION.into(),
                vec![*position as u64; height],
            ))?;
            Ok(frame)
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    stack_frames(&frames)
}

/// Result of [`process_tickers`].
#[derive(Clone, Debug, Default)]
pub struct BatchOutput {
    /// Batches in order.
    pub batches: Vec<TickerBatch>,
}

impl BatchOutput {
    /// All profile rows of the run as one table.
    pub fn profile_frame(&self) -> PolarsResult<DataFrame> {
        positioned_profiles(self.batches.iter().flat_map(|b| b.profiles.iter()))
    }

    /// All financial frames of the run stacked into one table.
    pub fn financial_frame(&self) -> PolarsResult<DataFrame> {
        positioned_financials(self.batches.iter().flat_map(|b| b.financials.iter()))
    }

    /// Every per-ticker failure, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &ExtractionFailure> {
        self.batches.iter().flat_map(|b| b.failures.iter())
    }

    /// Every per-ticker notice, in processing order.
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.batches.iter().flat_map(|b| b.notices.iter())
    }

    /// Number of successful profile rows.
    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.batches.iter().map(|b| b.profiles.len()).sum()
    }

    /// Number of successful financial frames.
    #[must_use]
    pub fn financial_count(&self) -> usize {
        self.batches.iter().map(|b| b.financials.len()).sum()
    }
}

async fn process_one<P>(
    provider: &P,
    position: usize,
    symbol: &Symbol,
    batch: &mut TickerBatch,
) where
    P: FundamentalsProvider + ?Sized,
{
    let fetched = provider.fetch_profile(symbol).await;
    let currencies = fetched
        .as_ref()
        .map_or_else(|_| CurrencyInfo::unknown(), CurrencyInfo::from_profile);

    match normalize_profile(symbol, fetched) {
        Ok(row) => batch.profiles.push((position, row)),
        Err(failure) => {
            warn!(symbol = %symbol, error = %failure, "Profile extraction failed");
            batch.failures.push(failure);
        }
    }

    match extract_financials(provider, symbol, &currencies).await {
        Ok(extract) => {
            if let TtmStatus::Unavailable { quarters_available } = extract.ttm {
                batch.notices.push(Notice::TtmUnavailable {
                    symbol: symbol.clone(),
                    quarters_available,
                });
            }
            batch.financials.push((position, extract.frame));
        }
        Err(failure) => {
            warn!(symbol = %symbol, error = %failure, "Financial extraction failed");
            batch.failures.push(failure);
        }
    }
}

/// Runs both normalizers over every ticker, in order.
///
/// `on_progress` is called once per finished ticker. Failures are collected
/// per batch, so the output always covers every submitted ticker.
pub async fn process_tickers<P, F>(
    provider: &P,
    tickers: &[Symbol],
    options: &ExtractOptions,
    mut on_progress: F,
) -> BatchOutput
where
    P: FundamentalsProvider + ?Sized,
    F: FnMut(&Progress),
{
    let chunks: Vec<&[Symbol]> = tickers.chunks(options.effective_batch_size()).collect();
    let batches = chunks.len();
    let total = tickers.len();
    info!(
        provider = provider.name(),
        tickers = total,
        batches,
        "Starting extraction"
    );

    let mut output = BatchOutput::default();
    let mut processed = 0;

    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut batch = TickerBatch::new(i + 1, chunk);
        debug!(batch = batch.index, size = chunk.len(), "Processing batch");

        for symbol in chunk {
            process_one(provider, processed, symbol, &mut batch).await;
            processed += 1;
            on_progress(&Progress {
                batch: batch.index,
                batches,
                processed,
                total,
                symbol: Some(symbol.clone()),
            });
        }

        info!(
            batch = batch.index,
            profiles = batch.profiles.len(),
            financials = batch.financials.len(),
            failures = batch.failures.len(),
            "Batch finished"
        );
        output.batches.push(batch);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureSide;
    use chrono::NaiveDate;
    use pulse_core::{DataError, InMemoryProvider, PeriodType, ProfileInfo, StatementTable};

    fn statement(periods: usize) -> StatementTable {
        let dates = (0..periods)
            .map(|i| NaiveDate::from_ymd_opt(2024 - i as i32, 12, 31).unwrap())
            .collect();
        StatementTable::new(dates)
            .with_line_item("Net Income", (0..periods).map(|i| Some(i as f64)).collect())
            .unwrap()
    }

    fn seeded(provider: InMemoryProvider, symbol: &str, quarters: usize) -> InMemoryProvider {
        provider
            .with_profile(
                symbol,
                ProfileInfo::new()
                    .with("longName", format!("{symbol} Inc."))
                    .with("currency", "USD"),
            )
            .with_financials(symbol, PeriodType::Annual, statement(3))
            .with_financials(symbol, PeriodType::Quarterly, statement(quarters))
    }

    #[tokio::test]
    async fn test_batches_and_progress() {
        let provider = ["A", "B", "C"]
            .into_iter()
            .fold(InMemoryProvider::new(), |p, s| seeded(p, s, 4));
        let tickers = Symbol::parse_list("A,B,C");

        let mut seen = Vec::new();
        let output = process_tickers(
            &provider,
            &tickers,
            &ExtractOptions::default().with_batch_size(2),
            |p| seen.push(p.clone()),
        )
        .await;

        assert_eq!(output.batches.len(), 2);
        assert_eq!(output.batches[0].symbols, Symbol::parse_list("A,B"));
        assert_eq!(output.batches[1].index, 2);
        assert_eq!(output.profile_count(), 3);
        assert_eq!(output.financial_count(), 3);
        assert_eq!(output.failures().count(), 0);

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].processed, 3);
        assert_eq!(seen[2].batch, 2);
        assert_eq!(seen[2].batches, 2);
        assert_eq!(seen[2].symbol, Some(Symbol::new("C")));
        assert!((seen[2].fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_processing() {
        let provider = seeded(InMemoryProvider::new(), "GOOGL", 4)
            .with_profile_error("BAD", DataError::Network("timeout".to_string()));
        let tickers = Symbol::parse_list("BAD,FAKE$$,GOOGL");

        let output = process_tickers(&provider, &tickers, &ExtractOptions::default(), |_| {}).await;

        assert_eq!(output.batches.len(), 1);
        assert_eq!(output.profile_count(), 1);
        assert_eq!(output.financial_count(), 1);

        let failures: Vec<_> = output
            .failures()
            .map(|f| (f.symbol.as_str().to_string(), f.side))
            .collect();
        assert_eq!(
            failures,
            vec![
                ("BAD".to_string(), FailureSide::Profile),
                ("BAD".to_string(), FailureSide::Financial),
                ("FAKE$$".to_string(), FailureSide::Profile),
                ("FAKE$$".to_string(), FailureSide::Financial),
            ]
        );

        let profiles = output.profile_frame().unwrap();
        assert_eq!(profiles.height(), 1);
    }

    #[tokio::test]
    async fn test_short_quarterly_history_is_noticed() {
        let provider = seeded(InMemoryProvider::new(), "ARTNA", 2);
        let output = process_tickers(
            &provider,
            &[Symbol::new("ARTNA")],
            &ExtractOptions::default(),
            |_| {},
        )
        .await;

        let notices: Vec<&Notice> = output.notices().collect();
        assert_eq!(
            notices,
            vec![&Notice::TtmUnavailable {
                symbol: Symbol::new("ARTNA"),
                quarters_available: 2,
            }]
        );
        assert_eq!(output.financial_frame().unwrap().height(), 4);
    }

    #[tokio::test]
    async fn test_currency_defaults_when_profile_fails() {
        let provider = InMemoryProvider::new()
            .with_profile_error("MSFT", DataError::Network("reset".to_string()))
            .with_financials("MSFT", PeriodType::Annual, statement(2))
            .with_financials("MSFT", PeriodType::Quarterly, statement(4));

        let output = process_tickers(
            &provider,
            &[Symbol::new("MSFT")],
            &ExtractOptions::default(),
            |_| {},
        )
        .await;

        let financials = output.financial_frame().unwrap();
        let currency = financials.column("Currency").unwrap().str().unwrap();
        assert_eq!(currency.get(0), Some("Unknown"));
        assert_eq!(output.profile_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_tickers_keep_their_positions() {
        let provider = seeded(InMemoryProvider::new(), "GOOGL", 4);
        let tickers = Symbol::parse_list("GOOGL,GOOGL");

        let output = process_tickers(&provider, &tickers, &ExtractOptions::default(), |_| {}).await;

        let positions: Vec<usize> = output.batches[0].profiles.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1]);

        let financials = output.financial_frame().unwrap();
        assert_eq!(financials.height(), 8);
        let column = financials.column(POSITION).unwrap().u64().unwrap();
        let column: Vec<Option<u64>> = column.into_iter().collect();
        assert_eq!(column[..4], [Some(0); 4]);
        assert_eq!(column[4..], [Some(1); 4]);
    }

    #[tokio::test]
    async fn test_empty_ticker_list() {
        let provider = InMemoryProvider::new();
        let output = process_tickers(&provider, &[], &ExtractOptions::default(), |_| {}).await;
        assert!(output.batches.is_empty());
        assert_eq!(output.profile_frame().unwrap().height(), 0);
    }
}
