#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/phronesis/pulse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Extraction pipeline for Pulse.
//!
//! Control flow for one run: [`Session::extract`] hands the ticker list to
//! [`process_tickers`], which calls the provider through
//! [`normalize_profile`] and [`extract_financials`] for each ticker in turn.
//! The accumulated tables are joined by [`merge_tables`] and projected by
//! [`project`]; [`XlsxExporter`] turns either projection into workbook bytes.

/// Sequential per-ticker processing.
pub mod batch;
/// Column names and the curated display list.
pub mod columns;
/// Error and failure types.
pub mod error;
/// Spreadsheet export.
pub mod export;
/// Financial normalizer and TTM synthesizer.
pub mod financials;
/// Inner join and column projections.
pub mod merge;
/// Profile normalizer.
pub mod profile;
/// Session object and run assembly.
pub mod session;
/// Row-major cell access for data frames.
pub mod table;

pub use batch::{BatchOutput, ExtractOptions, Progress, TickerBatch, process_tickers};
pub use columns::DISPLAY_COLUMNS;
pub use error::{ExtractionFailure, FailureReason, FailureSide, PipelineError, Result};
pub use export::{SpreadsheetWriter, XlsxExporter};
pub use financials::{
    CurrencyInfo, FinancialExtract, TtmStatus, extract_financials, normalize_financials,
};
pub use merge::{Projections, merge_tables, project};
pub use profile::{ProfileRow, normalize_profile, profiles_to_frame};
pub use session::{BatchReport, ExtractionRun, Notice, Session, Summary};
pub use table::{Cell, header, rows};
