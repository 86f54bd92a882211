use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::{PipelineError, Result};
use crate::frame::date_lit;

/// Replacement for a correlated identifier column.
#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Int(i64),
    Date(NaiveDate),
}

impl FillValue {
    fn to_expr(&self) -> Expr {
        match self {
            FillValue::Int(v) => lit(*v),
            FillValue::Date(d) => date_lit(*d),
        }
    }
}

/// Two-phase null resolution.
///
/// First every column named in `correlated_fill` has its nulls replaced by
/// the supplied value (identifiers such as a game id that only one side of
/// a join carried). Then the remaining nulls and NaNs of numeric columns
/// become zero. Non-numeric columns outside `correlated_fill` keep their
/// nulls: an identifier is never semantically zero.
pub fn resolve(df: DataFrame, correlated_fill: &[(&str, FillValue)]) -> Result<DataFrame> {
    let schema = df.schema().clone();
    let mut correlated = Vec::with_capacity(correlated_fill.len());
    for (column, fallback) in correlated_fill {
        if !schema.contains(column) {
            return Err(PipelineError::schema(
                "null resolver",
                format!("column '{column}' not found"),
            ));
        }
        correlated.push(col(*column).fill_null(fallback.to_expr()));
    }

    let zeros = schema
        .iter()
        .filter(|(name, _)| !correlated_fill.iter().any(|(c, _)| *c == name.as_str()))
        .filter_map(|(name, dtype)| {
            let column = col(name.clone());
            if dtype.is_float() {
                Some(column.fill_nan(lit(0.0)).fill_null(lit(0.0)))
            } else if dtype.is_integer() {
                Some(column.fill_null(lit(0)))
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    let mut lf = df.lazy();
    if !correlated.is_empty() {
        lf = lf.with_columns(correlated);
    }
    if !zeros.is_empty() {
        lf = lf.with_columns(zeros);
    }
    Ok(lf.collect()?)
}
