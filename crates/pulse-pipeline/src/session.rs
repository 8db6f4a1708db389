//! Session object and run assembly.
//!
//! A [`Session`] holds the loaded ticker list and the most recent
//! [`ExtractionRun`]. It is created when a ticker list is loaded and replaced
//! by the value [`Session::extract`] returns; the caller owns its lifetime.

use std::collections::HashSet;
use std::fmt;

use polars::prelude::DataFrame;
use pulse_core::{FundamentalsProvider, Symbol};
use serde::Serialize;
use tracing::{info, warn};

use crate::batch::{BatchOutput, ExtractOptions, Progress, TickerBatch, process_tickers};
use crate::columns::{DISPLAY_COLUMNS, TICKER};
use crate::error::{ExtractionFailure, PipelineError, Result};
use crate::merge::{Projections, merge_tables, project};

/// Informational message attached to a run. Never blocks results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Fewer than four quarters were available, so the TTM row is empty.
    TtmUnavailable {
        /// Affected ticker.
        symbol: Symbol,
        /// Quarterly periods the provider returned.
        quarters_available: usize,
    },
    /// Curated display columns that no ticker provided.
    MissingDisplayColumns {
        /// Column names, in curated order.
        columns: Vec<String>,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TtmUnavailable {
                symbol,
                quarters_available,
            } => write!(
                f,
                "{symbol}: only {quarters_available} quarters available, TTM values left empty"
            ),
            Self::MissingDisplayColumns { columns } => {
                write!(f, "Columns not found in data: {}", columns.join(", "))
            }
        }
    }
}

/// Headline counts of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Tickers submitted.
    pub submitted: usize,
    /// Distinct tickers in the display table.
    pub processed: usize,
    /// Distinct tickers with at least one failure.
    pub with_issues: usize,
}

/// One batch's tickers and its own display table.
#[derive(Clone, Debug)]
pub struct BatchReport {
    /// Batch number, counted from 1.
    pub index: usize,
    /// Tickers in the batch.
    pub symbols: Vec<Symbol>,
    /// Display projection of the batch, when the batch produced any data.
    pub display: Option<DataFrame>,
}

impl BatchReport {
    fn from_batch(batch: &TickerBatch) -> Self {
        let display = if batch.profiles.is_empty() || batch.financials.is_empty() {
            None
        } else {
            match batch_display(batch) {
                Ok(display) => Some(display),
                Err(e) => {
                    warn!(batch = batch.index, error = %e, "Could not build batch table");
                    None
                }
            }
        };

        Self {
            index: batch.index,
            symbols: batch.symbols.clone(),
            display,
        }
    }
}

fn batch_display(batch: &TickerBatch) -> Result<DataFrame> {
    let merged = merge_tables(&batch.profile_frame()?, &batch.financial_frame()?)?;
    Ok(project(&merged, DISPLAY_COLUMNS)?.display)
}

/// Everything one extraction produced.
#[derive(Debug)]
pub struct ExtractionRun {
    /// Per-batch reports, in order.
    pub batches: Vec<BatchReport>,
    /// Per-ticker failures, in processing order.
    pub failures: Vec<ExtractionFailure>,
    /// Informational notices.
    pub notices: Vec<Notice>,
    /// Consolidated projections, or the error that prevented them.
    pub results: Result<Projections>,
    /// Headline counts.
    pub summary: Summary,
}

impl ExtractionRun {
    /// Merges and projects the accumulated tables of a finished run.
    ///
    /// When no ticker produced a profile row, or none produced a financial
    /// frame, the run is a total failure and merge and projection are skipped.
    #[must_use]
    pub fn assemble(output: BatchOutput, submitted: usize) -> Self {
        let batches = output.batches.iter().map(BatchReport::from_batch).collect();
        let failures: Vec<ExtractionFailure> = output.failures().cloned().collect();
        let mut notices: Vec<Notice> = output.notices().cloned().collect();

        let results = consolidate(&output);
        if let Ok(projections) = &results {
            if !projections.missing_columns.is_empty() {
                notices.push(Notice::MissingDisplayColumns {
                    columns: projections.missing_columns.clone(),
                });
            }
        }

        let summary = Summary {
            submitted,
            processed: results
                .as_ref()
                .map_or(0, |p| distinct_tickers(&p.display)),
            with_issues: failures
                .iter()
                .map(|f| &f.symbol)
                .collect::<HashSet<_>>()
                .len(),
        };

        Self {
            batches,
            failures,
            notices,
            results,
            summary,
        }
    }

    /// The consolidated projections, unless the run failed outright.
    #[must_use]
    pub fn projections(&self) -> Option<&Projections> {
        self.results.as_ref().ok()
    }

    /// A batch report by number, counted from 1.
    #[must_use]
    pub fn batch(&self, index: usize) -> Option<&BatchReport> {
        self.batches.iter().find(|b| b.index == index)
    }
}

fn consolidate(output: &BatchOutput) -> Result<Projections> {
    if output.profile_count() == 0 || output.financial_count() == 0 {
        return Err(PipelineError::NoUsableData);
    }

    let merged = merge_tables(&output.profile_frame()?, &output.financial_frame()?)?;
    Ok(project(&merged, DISPLAY_COLUMNS)?)
}

fn distinct_tickers(table: &DataFrame) -> usize {
    table
        .column(TICKER)
        .ok()
        .and_then(|c| c.str().ok())
        .map_or(0, |tickers| {
            tickers.into_iter().flatten().collect::<HashSet<_>>().len()
        })
}

/// The ticker list and the latest run.
#[derive(Debug, Default)]
pub struct Session {
    tickers: Vec<Symbol>,
    run: Option<ExtractionRun>,
}

impl Session {
    /// Starts a session from comma-separated ticker input.
    ///
    /// Entries are trimmed and uppercased; empty entries are dropped.
    /// Duplicates are kept.
    #[must_use]
    pub fn load(input: &str) -> Self {
        Self::from_tickers(Symbol::parse_list(input))
    }

    /// Starts a session from an already parsed ticker list.
    #[must_use]
    pub fn from_tickers(tickers: Vec<Symbol>) -> Self {
        let tickers: Vec<Symbol> = tickers.into_iter().filter(|s| !s.is_empty()).collect();
        info!(tickers = tickers.len(), "Loaded ticker list");
        Self { tickers, run: None }
    }

    /// The loaded tickers, in submission order.
    #[must_use]
    pub fn tickers(&self) -> &[Symbol] {
        &self.tickers
    }

    /// The latest run, if extraction has happened.
    #[must_use]
    pub const fn run(&self) -> Option<&ExtractionRun> {
        self.run.as_ref()
    }

    /// Moves the latest run out of the session.
    pub fn take_run(&mut self) -> Option<ExtractionRun> {
        self.run.take()
    }

    /// Runs extraction over the loaded tickers.
    ///
    /// The returned session carries the new run; any previous run is dropped.
    pub async fn extract<P, F>(
        mut self,
        provider: &P,
        options: &ExtractOptions,
        on_progress: F,
    ) -> Self
    where
        P: FundamentalsProvider + ?Sized,
        F: FnMut(&Progress),
    {
        self.run = None;
        let output = process_tickers(provider, &self.tickers, options, on_progress).await;
        let run = ExtractionRun::assemble(output, self.tickers.len());

        match &run.results {
            Ok(_) => info!(
                submitted = run.summary.submitted,
                processed = run.summary.processed,
                with_issues = run.summary.with_issues,
                "Extraction complete"
            ),
            Err(e) => warn!(error = %e, "Extraction produced no results"),
        }

        self.run = Some(run);
        self
    }
}
