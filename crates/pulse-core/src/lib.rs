#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/phronesis/pulse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the Pulse fundamentals pipeline.
//!
//! This crate provides the foundational abstractions shared by the provider
//! implementations and the pipeline:
//!
//! - [`ProfileProvider`](provider::ProfileProvider) - Company profile records
//! - [`FinancialsProvider`](provider::FinancialsProvider) - Annual and quarterly statements
//! - [`FundamentalsProvider`](provider::FundamentalsProvider) - Both of the above
//! - [`InMemoryProvider`](memory::InMemoryProvider) - Seeded provider for tests

/// Error types for data operations.
pub mod error;
/// In-memory provider implementation.
pub mod memory;
/// Reporting period definitions.
pub mod period;
/// Provider traits for fetching profile and statement data.
pub mod provider;
/// Core data types (Symbol, ProfileInfo, StatementTable).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{DataError, Result};
pub use memory::InMemoryProvider;
pub use period::PeriodType;
pub use provider::{DataProvider, FinancialsProvider, FundamentalsProvider, ProfileProvider};
pub use types::{LineItem, ProfileInfo, StatementTable, Symbol};
