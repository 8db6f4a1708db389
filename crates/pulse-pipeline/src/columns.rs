//! Column names shared by the profile, financial and merged tables.
//!
//! The names match the headers of the exported workbooks.

/// Join key present in every table.
pub const TICKER: &str = "Ticker";
/// ISO date of the fiscal period, or [`TTM_LABEL`].
pub const FULL_DATE: &str = "Full_Date";
/// 0 for the TTM row, 1.. for annual periods in provider order.
pub const YEAR_INDEX: &str = "Year_Index";
/// Trading currency.
pub const CURRENCY: &str = "Currency";
/// Reporting currency of the statements.
pub const FINANCIAL_CURRENCY: &str = "Financial_Currency";

/// Company name.
pub const LONG_NAME: &str = "LongName";
/// Free-text business description.
pub const LONG_BUSINESS_SUMMARY: &str = "Long_Business_Summary";
/// Country of the company's address.
pub const COUNTRY: &str = "Country";
/// Business sector.
pub const SECTOR: &str = "Sector";
/// Industry within the sector.
pub const INDUSTRY: &str = "Industry";
/// Headcount, stringified.
pub const FULL_TIME_EMPLOYEES: &str = "Full_Time_Employees";
/// Company website.
pub const WEBSITE: &str = "Website";
/// Company phone number.
pub const PHONE: &str = "Phone";

/// `Full_Date` value of the synthesized trailing-twelve-month row.
pub const TTM_LABEL: &str = "TTM";

/// Placeholder for a missing profile field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Curated, ordered column list for the display projection.
pub const DISPLAY_COLUMNS: &[&str] = &[
    TICKER,
    FULL_DATE,
    YEAR_INDEX,
    LONG_NAME,
    LONG_BUSINESS_SUMMARY,
    CURRENCY,
    FINANCIAL_CURRENCY,
    SECTOR,
    INDUSTRY,
    FULL_TIME_EMPLOYEES,
    WEBSITE,
    PHONE,
    COUNTRY,
    "Total Revenue",
    "Operating Revenue",
    "Gross Profit",
    "Operating Expense",
    "Selling General and Administrative",
    "EBIT",
    "Normalized EBITDA",
    "Operating Income",
    "Net Income",
    "Selling General And Administration",
    "Cost Of Revenue",
];
