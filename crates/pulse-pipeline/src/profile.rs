//! Profile normalizer: raw profile mapping to a fixed-shape row.

use polars::prelude::*;
use pulse_core::{DataError, ProfileInfo, Symbol};
use serde::Serialize;
use tracing::debug;

use crate::columns::{
    COUNTRY, FULL_TIME_EMPLOYEES, INDUSTRY, LONG_BUSINESS_SUMMARY, LONG_NAME, NOT_AVAILABLE,
    PHONE, SECTOR, TICKER, WEBSITE,
};
use crate::error::{ExtractionFailure, FailureReason};

/// Provider keys read into a [`ProfileRow`].
const PROFILE_KEYS: &[&str] = &[
    "longName",
    "longBusinessSummary",
    "country",
    "sector",
    "industry",
    "fullTimeEmployees",
    "website",
    "phone",
];

/// One company profile.
///
/// String fields hold [`NOT_AVAILABLE`] when the provider left them out.
/// `full_time_employees` stays `None` instead, so a missing headcount is
/// distinguishable from a literal "N/A".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileRow {
    /// Join key.
    pub ticker: Symbol,
    /// Company name.
    pub long_name: String,
    /// Business description.
    pub long_business_summary: String,
    /// Country.
    pub country: String,
    /// Sector.
    pub sector: String,
    /// Industry.
    pub industry: String,
    /// Headcount as a string.
    pub full_time_employees: Option<String>,
    /// Website.
    pub website: String,
    /// Phone number.
    pub phone: String,
}

impl ProfileRow {
    /// Builds a row from a profile mapping, substituting the placeholder for
    /// every missing field.
    #[must_use]
    pub fn from_info(symbol: &Symbol, info: &ProfileInfo) -> Self {
        let field = |key: &str| {
            info.get_str(key)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        Self {
            ticker: symbol.clone(),
            long_name: field("longName"),
            long_business_summary: field("longBusinessSummary"),
            country: field("country"),
            sector: field("sector"),
            industry: field("industry"),
            full_time_employees: info.get_str("fullTimeEmployees"),
            website: field("website"),
            phone: field("phone"),
        }
    }
}

/// Normalizes the result of a profile fetch.
///
/// A provider error, or a mapping with none of the profile fields, is a
/// profile-side [`ExtractionFailure`].
pub fn normalize_profile(
    symbol: &Symbol,
    fetched: std::result::Result<ProfileInfo, DataError>,
) -> std::result::Result<ProfileRow, ExtractionFailure> {
    let info = fetched.map_err(|e| ExtractionFailure::profile(symbol, e))?;

    if !info.has_any(PROFILE_KEYS) {
        debug!(symbol = %symbol, fields = info.len(), "Profile has no usable fields");
        return Err(ExtractionFailure::profile(
            symbol,
            FailureReason::NoProfileData,
        ));
    }

    Ok(ProfileRow::from_info(symbol, &info))
}

/// Lays profile rows out as a data frame, one row per profile.
pub fn profiles_to_frame(rows: &[ProfileRow]) -> PolarsResult<DataFrame> {
    let text = |f: fn(&ProfileRow) -> &str| rows.iter().map(f).collect::<Vec<&str>>();

    DataFrame::new(vec![
        Column::new(TICKER.into(), text(|r| r.ticker.as_str())),
        Column::new(LONG_NAME.into(), text(|r| r.long_name.as_str())),
        Column::new(
            LONG_BUSINESS_SUMMARY.into(),
            text(|r| r.long_business_summary.as_str()),
        ),
        Column::new(COUNTRY.into(), text(|r| r.country.as_str())),
        Column::new(SECTOR.into(), text(|r| r.sector.as_str())),
        Column::new(INDUSTRY.into(), text(|r| r.industry.as_str())),
        Column::new(
            FULL_TIME_EMPLOYEES.into(),
            rows.iter()
                .map(|r| r.full_time_employees.as_deref())
                .collect::<Vec<Option<&str>>>(),
        ),
        Column::new(WEBSITE.into(), text(|r| r.website.as_str())),
        Column::new(PHONE.into(), text(|r| r.phone.as_str())),
    ])
}
