//! Row-major cell access for data frames.
//!
//! Both the spreadsheet writer and the JSON rendering of the dashboard walk
//! tables row by row; this module turns polars' columnar layout into that.

use polars::prelude::*;
use serde::Serialize;

/// One table cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Number(f64),
}

/// Column names in table order.
#[must_use]
pub fn header(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn column_cells(column: &Column) -> PolarsResult<Vec<Cell>> {
    let cells = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, |s| Cell::Text(s.to_string())))
            .collect(),
        DataType::Float64 => column
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Number))
            .collect(),
        DataType::Int64 => column
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Integer))
            .collect(),
        dtype if dtype.is_float() => return column_cells(&column.cast(&DataType::Float64)?),
        dtype if dtype.is_integer() => return column_cells(&column.cast(&DataType::Int64)?),
        _ => return column_cells(&column.cast(&DataType::String)?),
    };
    Ok(cells)
}

/// Table contents as rows of cells, in table order.
pub fn rows(df: &DataFrame) -> PolarsResult<Vec<Vec<Cell>>> {
    let mut columns = df
        .get_columns()
        .iter()
        .map(|c| column_cells(c).map(Vec::into_iter))
        .collect::<PolarsResult<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|_| {
            columns
                .iter_mut()
                .map(|cells| cells.next().unwrap_or(Cell::Null))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_row_major() {
        let df = DataFrame::new(vec![
            Column::new("Ticker".into(), vec!["AAPL", "AAPL"]),
            Column::new("Year_Index".into(), vec![0i64, 1]),
            Column::new("Net Income".into(), vec![None, Some(96_995.0)]),
            Column::new("Shares".into(), vec![Some(15_550i32), None]),
        ])
        .unwrap();

        assert_eq!(header(&df), vec!["Ticker", "Year_Index", "Net Income", "Shares"]);

        let rows = rows(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                Cell::Text("AAPL".to_string()),
                Cell::Integer(0),
                Cell::Null,
                Cell::Integer(15_550),
            ]
        );
        assert_eq!(rows[1][2], Cell::Number(96_995.0));
        assert_eq!(rows[1][3], Cell::Null);
    }

    #[test]
    fn test_cells_serialize_untagged() {
        let cells = vec![
            Cell::Null,
            Cell::Text("TTM".to_string()),
            Cell::Integer(3),
            Cell::Number(1.5),
        ];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,"TTM",3,1.5]"#);
    }
}
