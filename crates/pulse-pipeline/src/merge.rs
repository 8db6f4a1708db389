//! Merge and projection stage.
//!
//! Profile and financial tables are inner-joined on `Ticker`: a ticker has to
//! succeed on both sides to appear in any result. The merged table is then
//! projected twice, once onto the curated display list and once onto every
//! column with the curated ones first.

use std::collections::HashSet;

use polars::prelude::*;
use tracing::debug;

use crate::columns::TICKER;

/// Temporary column carrying the financial row order through the join.
const ROW_ORDER: &str = "__financial_row";

/// Submission position of a ticker. Second join key next to `Ticker` so a
/// ticker submitted twice is joined once per submission; dropped after the join.
pub(crate) const POSITION: &str = "__position";

/// The two projections of one merged table.
#[derive(Clone, Debug)]
pub struct Projections {
    /// Curated columns only, in curated order.
    pub display: DataFrame,
    /// Every merged column, curated ones first.
    pub full: DataFrame,
    /// Curated columns absent from the merged table.
    pub missing_columns: Vec<String>,
}

/// Vertically stacks frames whose column sets differ.
///
/// Columns appear in order of first appearance; cells a frame does not have
/// are null.
pub fn stack_frames(frames: &[DataFrame]) -> PolarsResult<DataFrame> {
    match frames {
        [] => Ok(DataFrame::empty()),
        [single] => Ok(single.clone()),
        _ => concat_lf_diagonal(
            frames
                .iter()
                .map(|df| df.clone().lazy())
                .collect::<Vec<_>>(),
            UnionArgs::default(),
        )?
        .collect(),
    }
}

/// Inner join of profile and financial tables on `Ticker`.
///
/// Profile columns come first. Rows follow the order of the financial table,
/// so each ticker's TTM row stays ahead of its annual rows. Tables built by
/// the batch processor also carry the submission position, which joins
/// alongside `Ticker`: a duplicated ticker then yields one copy of its rows
/// per submission instead of one per profile and frame pair.
pub fn merge_tables(profiles: &DataFrame, financials: &DataFrame) -> PolarsResult<DataFrame> {
    let indexed = financials.with_row_index(ROW_ORDER.into(), None)?;
    let positioned = profiles.get_column_index(POSITION).is_some()
        && financials.get_column_index(POSITION).is_some();

    let mut keys = vec![col(TICKER)];
    if positioned {
        keys.push(col(POSITION));
    }

    let mut merged = profiles
        .clone()
        .lazy()
        .join(
            indexed.lazy(),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Inner),
        )
        .sort(
            [ROW_ORDER],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?
        .drop(ROW_ORDER)?;
    if positioned {
        merged = merged.drop(POSITION)?;
    }

    debug!(
        profiles = profiles.height(),
        financials = financials.height(),
        merged = merged.height(),
        "Merged profile and financial tables"
    );
    Ok(merged)
}

/// Projects a merged table onto the curated list and onto all columns.
///
/// Curated columns missing from `merged` are skipped and reported in
/// [`Projections::missing_columns`]. The full projection is a permutation of
/// the merged columns.
pub fn project(merged: &DataFrame, curated: &[&str]) -> PolarsResult<Projections> {
    let available: HashSet<&str> = merged
        .get_column_names()
        .into_iter()
        .map(PlSmallStr::as_str)
        .collect();

    let mut seen = HashSet::new();
    let mut display_columns = Vec::new();
    let mut missing_columns = Vec::new();
    for &name in curated {
        if !seen.insert(name) {
            continue;
        }
        if available.contains(name) {
            display_columns.push(name);
        } else {
            missing_columns.push(name.to_string());
        }
    }

    let full_columns: Vec<&str> = display_columns
        .iter()
        .copied()
        .chain(
            merged
                .get_column_names()
                .into_iter()
                .map(PlSmallStr::as_str)
                .filter(|name| !seen.contains(name)),
        )
        .collect();

    if !missing_columns.is_empty() {
        debug!(missing = ?missing_columns, "Curated columns not present in data");
    }

    Ok(Projections {
        display: merged.select(display_columns)?,
        full: merged.select(full_columns)?,
        missing_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{FULL_DATE, SECTOR};

    fn profiles(tickers: &[&str]) -> DataFrame {
        DataFrame::new(vec![
            Column::new(TICKER.into(), tickers.to_vec()),
            Column::new(SECTOR.into(), vec!["Technology"; tickers.len()]),
            Column::new("Phone".into(), vec!["N/A"; tickers.len()]),
        ])
        .unwrap()
    }

    fn financials() -> DataFrame {
        DataFrame::new(vec![
            Column::new(TICKER.into(), vec!["B", "B", "A", "A", "A"]),
            Column::new(
                FULL_DATE.into(),
                vec!["TTM", "2024-12-31", "TTM", "2024-09-30", "2023-09-30"],
            ),
            Column::new(
                "Net Income".into(),
                vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
            ),
        ])
        .unwrap()
    }

    fn tickers_of(df: &DataFrame) -> Vec<String> {
        df.column(TICKER)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|t| t.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_merge_is_inner_join() {
        let merged = merge_tables(&profiles(&["A", "C"]), &financials()).unwrap();

        assert_eq!(tickers_of(&merged), vec!["A", "A", "A"]);
        let dates = merged.column(FULL_DATE).unwrap().str().unwrap();
        assert_eq!(dates.get(0), Some("TTM"));
        assert_eq!(dates.get(2), Some("2023-09-30"));
        assert!(merged.column(ROW_ORDER).is_err());
    }

    #[test]
    fn test_merge_keeps_financial_row_order() {
        let merged = merge_tables(&profiles(&["A", "B"]), &financials()).unwrap();

        assert_eq!(tickers_of(&merged), vec!["B", "B", "A", "A", "A"]);
        let names: Vec<String> = header_of(&merged);
        assert_eq!(names, vec![TICKER, SECTOR, "Phone", FULL_DATE, "Net Income"]);
    }

    fn header_of(df: &DataFrame) -> Vec<String> {
        crate::table::header(df)
    }

    #[test]
    fn test_display_projection_intersects_curated_list() {
        let merged = profiles(&["A"]);
        let projections = project(&merged, &[TICKER, SECTOR, "Net Income"]).unwrap();

        assert_eq!(header_of(&projections.display), vec![TICKER, SECTOR]);
        assert_eq!(projections.missing_columns, vec!["Net Income".to_string()]);
    }

    #[test]
    fn test_full_projection_is_permutation() {
        let merged = merge_tables(&profiles(&["A", "B"]), &financials()).unwrap();
        let projections = project(&merged, &["Net Income", TICKER, "EBIT"]).unwrap();

        assert_eq!(
            header_of(&projections.full),
            vec!["Net Income", TICKER, SECTOR, "Phone", FULL_DATE]
        );
        let full: HashSet<String> = header_of(&projections.full).into_iter().collect();
        let all: HashSet<String> = header_of(&merged).into_iter().collect();
        assert_eq!(full, all);
        assert_eq!(projections.full.height(), merged.height());
        assert_eq!(projections.display.height(), merged.height());
    }

    #[test]
    fn test_positions_pair_duplicate_tickers() {
        let profiles = DataFrame::new(vec![
            Column::new(TICKER.into(), vec!["A", "A"]),
            Column::new(POSITION.into(), vec![0u64, 1]),
        ])
        .unwrap();
        let financials = DataFrame::new(vec![
            Column::new(TICKER.into(), vec!["A", "A", "A", "A"]),
            Column::new(FULL_DATE.into(), vec!["TTM", "2024-12-31", "TTM", "2024-12-31"]),
            Column::new(POSITION.into(), vec![0u64, 0, 1, 1]),
        ])
        .unwrap();

        let merged = merge_tables(&profiles, &financials).unwrap();
        assert_eq!(merged.height(), 4);
        assert_eq!(header_of(&merged), vec![TICKER, FULL_DATE]);

        // without positions every profile row pairs with every frame row
        let unkeyed = merge_tables(
            &profiles.drop(POSITION).unwrap(),
            &financials.drop(POSITION).unwrap(),
        )
        .unwrap();
        assert_eq!(unkeyed.height(), 8);
    }

    #[test]
    fn test_stack_frames_unions_columns() {
        let a = DataFrame::new(vec![
            Column::new(TICKER.into(), vec!["A"]),
            Column::new("EBIT".into(), vec![Some(1.0)]),
        ])
        .unwrap();
        let b = DataFrame::new(vec![
            Column::new(TICKER.into(), vec!["B"]),
            Column::new("Net Income".into(), vec![Some(2.0)]),
        ])
        .unwrap();

        let stacked = stack_frames(&[a, b]).unwrap();
        assert_eq!(header_of(&stacked), vec![TICKER, "EBIT", "Net Income"]);
        assert_eq!(stacked.height(), 2);
        let ebit = stacked.column("EBIT").unwrap().f64().unwrap();
        assert_eq!(ebit.get(1), None);

        assert_eq!(stack_frames(&[]).unwrap().height(), 0);
    }
}
