//! Typed column buffers that turn raw cells into polars columns, plus the
//! date and cell helpers shared by the loader and tests.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::schema::{ColumnType, parse_date};

// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Literal expression of polars `Date` type.
pub fn date_lit(date: NaiveDate) -> Expr {
    lit(date_to_days(date)).cast(DataType::Date)
}

/// Accumulates one column's cells before it becomes a polars [`Column`].
#[derive(Debug, Clone)]
pub enum ColumnBuffer {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Date(Vec<Option<i32>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnBuffer {
    pub fn new(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Integer => ColumnBuffer::Int(Vec::with_capacity(capacity)),
            ColumnType::Float => ColumnBuffer::Float(Vec::with_capacity(capacity)),
            ColumnType::Text => ColumnBuffer::Text(Vec::with_capacity(capacity)),
            ColumnType::Date => ColumnBuffer::Date(Vec::with_capacity(capacity)),
            ColumnType::Boolean => ColumnBuffer::Bool(Vec::with_capacity(capacity)),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnBuffer::Int(_) => ColumnType::Integer,
            ColumnBuffer::Float(_) => ColumnType::Float,
            ColumnBuffer::Text(_) => ColumnType::Text,
            ColumnBuffer::Date(_) => ColumnType::Date,
            ColumnBuffer::Bool(_) => ColumnType::Boolean,
        }
    }

    pub fn push_null(&mut self) {
        match self {
            ColumnBuffer::Int(v) => v.push(None),
            ColumnBuffer::Float(v) => v.push(None),
            ColumnBuffer::Text(v) => v.push(None),
            ColumnBuffer::Date(v) => v.push(None),
            ColumnBuffer::Bool(v) => v.push(None),
        }
    }

    /// Parses one raw cell. Empty cells and the provider's `-` placeholder are null.
    pub fn push_raw(&mut self, column: &str, raw: &str) -> Result<()> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "-" {
            self.push_null();
            return Ok(());
        }
        let ty = self.column_type();
        let invalid = || PipelineError::InvalidValue {
            column: column.to_string(),
            value: trimmed.to_string(),
            ty,
        };
        match self {
            ColumnBuffer::Int(v) => v.push(Some(parse_integer(trimmed).ok_or_else(invalid)?)),
            ColumnBuffer::Float(v) => v.push(Some(trimmed.parse::<f64>().map_err(|_| invalid())?)),
            ColumnBuffer::Text(v) => v.push(Some(trimmed.to_string())),
            ColumnBuffer::Date(v) => {
                let date = parse_date(trimmed).ok_or_else(invalid)?;
                v.push(Some(date_to_days(date)));
            }
            ColumnBuffer::Bool(v) => {
                let flag = match trimmed.to_ascii_lowercase().as_str() {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    _ => return Err(invalid()),
                };
                v.push(Some(flag));
            }
        }
        Ok(())
    }

    pub fn into_column(self, name: &str) -> Result<Column> {
        let name: PlSmallStr = name.into();
        let column = match self {
            ColumnBuffer::Int(v) => Column::new(name, v),
            ColumnBuffer::Float(v) => Column::new(name, v),
            ColumnBuffer::Text(v) => Column::new(name, v),
            ColumnBuffer::Date(v) => Column::new(name, v).cast(&DataType::Date)?,
            ColumnBuffer::Bool(v) => Column::new(name, v),
        };
        Ok(column)
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    // The provider occasionally writes whole counts as `3.0`.
    let v = raw.parse::<f64>().ok()?;
    (v.fract() == 0.0 && v.is_finite()).then_some(v as i64)
}

/// Builds a frame from `(name, buffer)` pairs in order.
pub fn frame_from_buffers(columns: Vec<(&str, ColumnBuffer)>) -> Result<DataFrame> {
    let columns = columns
        .into_iter()
        .map(|(name, buffer)| buffer.into_column(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

/// Vertical union of frames that must share names, order and types.
/// `origins` names each frame for the error message.
pub fn union_exact(frames: Vec<DataFrame>, origins: &[String]) -> Result<DataFrame> {
    let Some(first) = frames.first() else {
        return Err(PipelineError::schema("union", "nothing to union"));
    };
    for (idx, frame) in frames.iter().enumerate().skip(1) {
        if frame.schema() != first.schema() {
            let origin = origins.get(idx).cloned().unwrap_or_else(|| "union".to_string());
            return Err(PipelineError::schema(
                origin,
                format!(
                    "columns {:?} do not match {:?}",
                    column_names(frame),
                    column_names(first)
                ),
            ));
        }
    }
    let lazy = frames.into_iter().map(IntoLazy::lazy).collect::<Vec<_>>();
    Ok(concat(lazy, UnionArgs::default())?.collect()?)
}

/// Renames `(from, to)` pairs in order. Every `from` must exist.
pub fn rename_columns(mut df: DataFrame, renames: &[(&str, &str)]) -> Result<DataFrame> {
    for (from, to) in renames {
        df.rename(from, (*to).into())?;
    }
    Ok(df)
}

/// Fails with the first key that occurs on more than one row. Keys compare
/// by typed value, so a null never equals the text `"null"`.
pub fn ensure_unique(df: &DataFrame, keys: &[&str], origin: &str) -> Result<()> {
    let dupes = df
        .clone()
        .lazy()
        .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([len().alias("rows")])
        .filter(col("rows").gt(lit(1)))
        .collect()?;
    if dupes.height() == 0 {
        return Ok(());
    }
    let key = keys
        .iter()
        .map(|k| Ok(format!("{k}={}", cell(&dupes, k, 0)?)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    Err(PipelineError::DuplicateEntityKey {
        origin: origin.to_string(),
        key,
    })
}

pub fn cell<'a>(df: &'a DataFrame, column: &str, row: usize) -> Result<AnyValue<'a>> {
    Ok(df.column(column)?.get(row)?)
}

pub fn text_at(df: &DataFrame, column: &str, row: usize) -> Result<Option<String>> {
    match cell(df, column, row)? {
        AnyValue::Null => Ok(None),
        AnyValue::String(s) => Ok(Some(s.to_string())),
        AnyValue::StringOwned(s) => Ok(Some(s.to_string())),
        other => Err(PipelineError::schema(column, format!("{other} is not text"))),
    }
}

pub fn float_at(df: &DataFrame, column: &str, row: usize) -> Result<Option<f64>> {
    Ok(cell(df, column, row)?.extract::<f64>())
}

pub fn int_at(df: &DataFrame, column: &str, row: usize) -> Result<Option<i64>> {
    match cell(df, column, row)? {
        AnyValue::Float32(_) | AnyValue::Float64(_) => {
            Err(PipelineError::schema(column, "float column read as integer"))
        }
        other => Ok(other.extract::<i64>()),
    }
}

pub fn date_at(df: &DataFrame, column: &str, row: usize) -> Result<Option<NaiveDate>> {
    match cell(df, column, row)? {
        AnyValue::Null => Ok(None),
        AnyValue::Date(days) => Ok(days_to_date(days)),
        other => Err(PipelineError::schema(column, format!("{other} is not a date"))),
    }
}

pub fn bool_at(df: &DataFrame, column: &str, row: usize) -> Result<Option<bool>> {
    match cell(df, column, row)? {
        AnyValue::Null => Ok(None),
        AnyValue::Boolean(b) => Ok(Some(b)),
        other => Err(PipelineError::schema(column, format!("{other} is not a boolean"))),
    }
}
