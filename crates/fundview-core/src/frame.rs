//! Table construction and the session payload codec.
//!
//! Every table produced by this workspace has the same shape: a leading [`DATE_COLUMN`] of
//! polars `Date`, followed by value columns that are `Float64` when every cell is numeric or
//! missing and `String` otherwise. Text from CSV files, provider archives and session
//! payloads all goes through [`build_table`] so the shape rule lives in one place.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde_json::{Map, Value, json};

use crate::error::{DataError, Result};

/// Name of the row identity column of every table.
pub const DATE_COLUMN: &str = "date";

/// `NaiveDate::num_days_from_ce` of 1970-01-01; polars dates count days from there.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// A single untyped table cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Numeric value.
    Number(f64),
    /// Anything that is not a number.
    Text(String),
}

impl Cell {
    /// Classifies raw text. Empty strings and the usual missing-value spellings are null.
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || matches!(s, "nan" | "NaN" | "null" | "None" | "NaT" | "N/A") {
            return Self::Null;
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Number(v),
            _ => Self::Text(s.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Number(v) => json!(v),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Row ordering applied by [`build_table`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    /// Keep rows in input order.
    Preserve,
    /// Sort ascending by date; of rows sharing a date only the last one is kept.
    Ascending,
}

/// Parses a date from the common textual spellings, ignoring any time of day.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Days since 1970-01-01, the physical value of a polars `Date`.
#[must_use]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Inverse of [`date_to_days`].
#[must_use]
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    days.checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

fn parse_err(e: impl std::fmt::Display) -> DataError {
    DataError::Parse(e.to_string())
}

/// Builds a table from dates and untyped value columns.
///
/// Rows with a missing date are dropped. Value columns named like [`DATE_COLUMN`] are
/// ignored.
pub fn build_table(
    dates: Vec<Option<NaiveDate>>,
    columns: Vec<(String, Vec<Cell>)>,
    order: RowOrder,
) -> Result<DataFrame> {
    for (name, cells) in &columns {
        if cells.len() != dates.len() {
            return Err(DataError::Parse(format!(
                "Column {name} has {} values for {} rows",
                cells.len(),
                dates.len()
            )));
        }
    }

    let mut rows: Vec<(usize, NaiveDate)> = dates
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.map(|d| (i, d)))
        .collect();

    if order == RowOrder::Ascending {
        // Stable sort: rows sharing a date stay in input order, so the last one is the latest.
        rows.sort_by_key(|&(_, d)| d);
        let mut deduped: Vec<(usize, NaiveDate)> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.1 == row.1 => *last = row,
                _ => deduped.push(row),
            }
        }
        rows = deduped;
    }

    let days: Vec<i32> = rows.iter().map(|&(_, d)| date_to_days(d)).collect();
    let mut out = Vec::with_capacity(columns.len() + 1);
    out.push(
        Column::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(parse_err)?,
    );

    for (name, cells) in columns {
        if name == DATE_COLUMN {
            continue;
        }
        let is_text = cells.iter().any(|c| matches!(c, Cell::Text(_)));
        let column = if is_text {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|&(i, _)| match &cells[i] {
                    Cell::Null => None,
                    Cell::Number(v) => Some(v.to_string()),
                    Cell::Text(s) => Some(s.clone()),
                })
                .collect();
            Column::new(name.as_str().into(), values)
        } else {
            let values: Vec<Option<f64>> = rows
                .iter()
                .map(|&(i, _)| match &cells[i] {
                    Cell::Number(v) => Some(*v),
                    _ => None,
                })
                .collect();
            Column::new(name.as_str().into(), values)
        };
        out.push(column);
    }

    DataFrame::new(out).map_err(parse_err)
}

/// Reads any column as untyped cells.
pub fn column_cells(column: &Column) -> Result<Vec<Cell>> {
    let cells = match column.dtype() {
        DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::UInt64
        | DataType::UInt32 => {
            let cast = column.cast(&DataType::Float64).map_err(parse_err)?;
            cast.f64()
                .map_err(parse_err)?
                .into_iter()
                .map(|v| match v {
                    Some(v) if v.is_finite() => Cell::Number(v),
                    _ => Cell::Null,
                })
                .collect()
        }
        DataType::String => column
            .str()
            .map_err(parse_err)?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::infer))
            .collect(),
        DataType::Date => {
            let cast = column.cast(&DataType::Int32).map_err(parse_err)?;
            cast.i32()
                .map_err(parse_err)?
                .into_iter()
                .map(|v| {
                    v.and_then(days_to_date)
                        .map_or(Cell::Null, |d| Cell::Text(d.to_string()))
                })
                .collect()
        }
        _ => {
            let cast = column.cast(&DataType::String).map_err(parse_err)?;
            cast.str()
                .map_err(parse_err)?
                .into_iter()
                .map(|v| v.map_or(Cell::Null, |s| Cell::Text(s.to_string())))
                .collect()
        }
    };
    Ok(cells)
}

/// Reads a column as dates. Date columns are read directly, text is parsed.
pub fn column_dates(column: &Column) -> Result<Vec<Option<NaiveDate>>> {
    match column.dtype() {
        DataType::Date => {
            let cast = column.cast(&DataType::Int32).map_err(parse_err)?;
            Ok(cast
                .i32()
                .map_err(parse_err)?
                .into_iter()
                .map(|v| v.and_then(days_to_date))
                .collect())
        }
        DataType::String => Ok(column
            .str()
            .map_err(parse_err)?
            .into_iter()
            .map(|v| v.and_then(parse_date))
            .collect()),
        other => Err(DataError::Parse(format!(
            "Column {} of type {other} does not hold dates",
            column.name()
        ))),
    }
}

/// Dates of a table's [`DATE_COLUMN`].
pub fn table_dates(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    column_dates(df.column(DATE_COLUMN).map_err(parse_err)?)
}

/// Reads a numeric column as `f64` values.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name).map_err(parse_err)?;
    Ok(column_cells(column)?
        .into_iter()
        .map(|c| match c {
            Cell::Number(v) => Some(v),
            _ => None,
        })
        .collect())
}

/// Re-keys a frame on one of its columns: `date_column` becomes [`DATE_COLUMN`] and moves to
/// the front, the rest are carried over as value columns.
pub fn with_date_index(df: &DataFrame, date_column: &str, order: RowOrder) -> Result<DataFrame> {
    let dates = column_dates(df.column(date_column).map_err(parse_err)?)?;
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == date_column {
            continue;
        }
        columns.push((name.to_string(), column_cells(column)?));
    }
    build_table(dates, columns, order)
}

/// Builds a frame from text records with no date semantics; each column is typed by
/// [`Cell::infer`]. Short records are padded with nulls.
pub fn frame_from_text_records(headers: &[String], records: &[Vec<String>]) -> Result<DataFrame> {
    let mut out = Vec::with_capacity(headers.len());
    for (j, header) in headers.iter().enumerate() {
        let cells: Vec<Cell> = records
            .iter()
            .map(|r| r.get(j).map_or(Cell::Null, |s| Cell::infer(s)))
            .collect();
        let is_text = cells.iter().any(|c| matches!(c, Cell::Text(_)));
        let column = if is_text {
            let values: Vec<Option<String>> = cells
                .into_iter()
                .map(|c| match c {
                    Cell::Null => None,
                    Cell::Number(v) => Some(v.to_string()),
                    Cell::Text(s) => Some(s),
                })
                .collect();
            Column::new(header.as_str().into(), values)
        } else {
            let values: Vec<Option<f64>> = cells
                .into_iter()
                .map(|c| match c {
                    Cell::Number(v) => Some(v),
                    _ => None,
                })
                .collect();
            Column::new(header.as_str().into(), values)
        };
        out.push(column);
    }
    DataFrame::new(out).map_err(parse_err)
}

/// Builds a table from text records whose first field is the date.
pub fn table_from_text_records(
    headers: &[String],
    records: &[Vec<String>],
    order: RowOrder,
) -> Result<DataFrame> {
    let dates = records
        .iter()
        .map(|r| r.first().and_then(|s| parse_date(s)))
        .collect();
    let columns = headers
        .iter()
        .enumerate()
        .skip(1)
        .map(|(j, header)| {
            let cells = records
                .iter()
                .map(|r| r.get(j).map_or(Cell::Null, |s| Cell::infer(s)))
                .collect();
            (header.clone(), cells)
        })
        .collect();
    build_table(dates, columns, order)
}

/// Serializes a table as a JSON "split" payload: `columns`, `index` (ISO dates) and `data`
/// (one array per row). Missing and non-finite numbers become `null`.
pub fn encode_split(df: &DataFrame) -> Result<String> {
    let dates = table_dates(df)?;
    let mut names = Vec::with_capacity(df.width());
    let mut cells = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == DATE_COLUMN {
            continue;
        }
        names.push(name.to_string());
        cells.push(column_cells(column)?);
    }

    let index: Vec<Value> = dates
        .iter()
        .map(|d| d.map_or(Value::Null, |d| Value::String(d.to_string())))
        .collect();
    let data: Vec<Value> = (0..dates.len())
        .map(|i| Value::Array(cells.iter().map(|c| c[i].to_json()).collect()))
        .collect();

    let mut payload = Map::new();
    payload.insert("columns".into(), json!(names));
    payload.insert("index".into(), Value::Array(index));
    payload.insert("data".into(), Value::Array(data));
    serde_json::to_string(&Value::Object(payload)).map_err(parse_err)
}

/// Inverse of [`encode_split`].
///
/// Index entries may be ISO dates or epoch milliseconds. Row order is kept as encoded.
pub fn decode_split(payload: &str) -> Result<DataFrame> {
    let value: Value = serde_json::from_str(payload).map_err(parse_err)?;
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| DataError::Parse(format!("Split payload has no {name} array")))
    };
    let names: Vec<String> = field("columns")?
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    let index = field("index")?;
    let data = field("data")?;
    if index.len() != data.len() {
        return Err(DataError::Parse(format!(
            "Split payload has {} index entries for {} rows",
            index.len(),
            data.len()
        )));
    }

    let dates = index
        .iter()
        .map(|v| match v {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.date_naive()),
            _ => None,
        })
        .collect();

    let mut columns: Vec<(String, Vec<Cell>)> = names
        .into_iter()
        .map(|n| (n, Vec::with_capacity(data.len())))
        .collect();
    for (i, row) in data.iter().enumerate() {
        let row = row
            .as_array()
            .filter(|r| r.len() == columns.len())
            .ok_or_else(|| DataError::Parse(format!("Split payload row {i} is malformed")))?;
        for (cell, (_, cells)) in row.iter().zip(columns.iter_mut()) {
            cells.push(match cell {
                Value::Null => Cell::Null,
                Value::Number(n) => n.as_f64().map_or(Cell::Null, Cell::Number),
                Value::String(s) => Cell::Text(s.clone()),
                other => Cell::Text(other.to_string()),
            });
        }
    }

    build_table(dates, columns, RowOrder::Preserve)
}
