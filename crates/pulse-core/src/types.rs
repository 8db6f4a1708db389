//! Core data types for profile and financial statement data.
//!
//! This module defines the shapes that cross the provider boundary:
//!
//! - [`Symbol`] - Normalized ticker symbol
//! - [`ProfileInfo`] - Raw company profile mapping
//! - [`StatementTable`] - Financial statement as line items x fiscal periods
//! - [`LineItem`] - One named row of a statement

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};

/// A ticker symbol.
///
/// Symbols are trimmed and uppercased on creation. They are not validated
/// against any exchange listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, trimming whitespace and converting to uppercase.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_uppercase())
    }

    /// Parses a comma-separated list of tickers.
    ///
    /// Entries that are empty after trimming are dropped. Order and duplicates
    /// are preserved.
    #[must_use]
    pub fn parse_list(input: &str) -> Vec<Self> {
        input
            .split(',')
            .map(Self::new)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the symbol is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let symbol = Self::new(s);
        if symbol.is_empty() {
            return Err(DataError::InvalidParameter(
                "ticker symbol is empty".to_string(),
            ));
        }
        Ok(symbol)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Raw company profile as returned by a provider.
///
/// An unordered mapping of provider-defined field names to JSON values.
/// Absent keys are normal; the pipeline decides what to substitute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo(Map<String, Value>);

impl ProfileInfo {
    /// Value substituted for a missing currency field.
    pub const UNKNOWN_CURRENCY: &'static str = "Unknown";

    /// Creates an empty profile mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value for a field. JSON `null` counts as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Returns a field rendered as a string.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON form.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Returns true if any of the given keys carries a value.
    #[must_use]
    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.get(k).is_some())
    }

    /// Trading currency, or `"Unknown"`.
    #[must_use]
    pub fn currency(&self) -> String {
        self.get_str("currency")
            .unwrap_or_else(|| Self::UNKNOWN_CURRENCY.to_string())
    }

    /// Currency the financial statements are reported in, or `"Unknown"`.
    #[must_use]
    pub fn financial_currency(&self) -> String {
        self.get_str("financialCurrency")
            .unwrap_or_else(|| Self::UNKNOWN_CURRENCY.to_string())
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ProfileInfo {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One named row of a financial statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Provider-defined line-item name (e.g. "Total Revenue").
    pub name: String,
    /// One value per period, aligned with [`StatementTable::periods`].
    pub values: Vec<Option<f64>>,
}

/// A financial statement laid out as line items x fiscal periods.
///
/// Periods keep the order the provider returned them in; line items keep
/// their insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    periods: Vec<NaiveDate>,
    line_items: Vec<LineItem>,
}

impl StatementTable {
    /// Creates a table with the given periods and no line items.
    #[must_use]
    pub const fn new(periods: Vec<NaiveDate>) -> Self {
        Self {
            periods,
            line_items: Vec::new(),
        }
    }

    /// Creates an empty table.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Appends a line item.
    ///
    /// Fails if the number of values differs from the number of periods.
    pub fn push_line_item(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<()> {
        let name = name.into();
        if values.len() != self.periods.len() {
            return Err(DataError::Parse(format!(
                "line item '{name}' has {} values for {} periods",
                values.len(),
                self.periods.len()
            )));
        }
        self.line_items.push(LineItem { name, values });
        Ok(())
    }

    /// Builder-style variant of [`push_line_item`](Self::push_line_item).
    pub fn with_line_item(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        self.push_line_item(name, values)?;
        Ok(self)
    }

    /// Reporting periods in provider order.
    #[must_use]
    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// Looks up a line item by name.
    #[must_use]
    pub fn line_item(&self, name: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.name == name)
    }

    /// Number of periods.
    #[must_use]
    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    /// Returns true when there are no periods or no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.line_items.is_empty()
    }
}
