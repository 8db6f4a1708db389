#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/phronesis/pulse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Pulse command-line tool and JSON API.
//!
//! Re-exports the core types, the Yahoo Finance provider and the extraction
//! pipeline, and adds the [`config`] layer, the [`app`] router and the
//! [`commands`] the binary dispatches to.

/// JSON API router and handlers.
pub mod app;
/// Subcommand implementations.
pub mod commands;
/// Command-line and environment configuration.
pub mod config;

pub use pulse_core::{
    DataError, FinancialsProvider, FundamentalsProvider, InMemoryProvider, PeriodType,
    ProfileInfo, ProfileProvider, StatementTable, Symbol,
};
pub use pulse_pipeline::{
    ExtractOptions, ExtractionRun, PipelineError, Projections, Session, SpreadsheetWriter,
    Summary, XlsxExporter,
};
pub use pulse_yahoo::YahooProvider;
