//! Derived share, rate and per-game columns. Every derivation is a column
//! expression; a degenerate denominator yields 0 rather than NaN or infinity.

use polars::prelude::*;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Rewrites a seconds column in place as minutes.
    SecondsToMinutes { column: &'static str },
    /// `for / (for + against) * 100`, rounded to two decimals.
    Share {
        for_col: &'static str,
        against_col: &'static str,
        out: &'static str,
    },
    /// `total * (60 / minutes)`.
    PerHour {
        total: &'static str,
        minutes: &'static str,
        out: &'static str,
    },
    PerGame {
        total: &'static str,
        games: &'static str,
        out: &'static str,
    },
}

impl Derivation {
    fn output(&self) -> &'static str {
        match *self {
            Derivation::SecondsToMinutes { column } => column,
            Derivation::Share { out, .. }
            | Derivation::PerHour { out, .. }
            | Derivation::PerGame { out, .. } => out,
        }
    }
}

/// Applies `derivations` in order. A derivation may read a column produced
/// by an earlier one. Null operands propagate as null so the null resolver
/// decides their fill.
pub fn derive(df: DataFrame, derivations: &[Derivation]) -> Result<DataFrame> {
    if derivations.is_empty() {
        return Ok(df);
    }
    let schema = df.schema().clone();
    let mut produced: Vec<&str> = Vec::with_capacity(derivations.len());
    let mut lf = df.lazy();
    for derivation in derivations {
        let operand = |name: &str| numeric(&schema, &produced, name);
        let expr = match *derivation {
            Derivation::SecondsToMinutes { column } => operand(column)? / lit(60.0),
            Derivation::Share {
                for_col,
                against_col,
                ..
            } => {
                let (f, a) = (operand(for_col)?, operand(against_col)?);
                let total = f.clone() + a;
                let pct = f / total.clone() * lit(100.0);
                zero_when_zero(total, round2(pct))
            }
            Derivation::PerHour { total, minutes, .. } => {
                let minutes = operand(minutes)?;
                zero_when_zero(minutes.clone(), operand(total)? * (lit(60.0) / minutes))
            }
            Derivation::PerGame { total, games, .. } => {
                let games = operand(games)?;
                zero_when_zero(games.clone(), operand(total)? / games)
            }
        };
        let out = derivation.output();
        lf = lf.with_column(expr.alias(out));
        produced.push(out);
    }
    Ok(lf.collect()?)
}

fn zero_when_zero(denominator: Expr, value: Expr) -> Expr {
    when(denominator.eq(lit(0.0)))
        .then(lit(0.0))
        .otherwise(value)
}

fn round2(v: Expr) -> Expr {
    (v * lit(100.0) + lit(0.5)).floor() / lit(100.0)
}

fn numeric(schema: &Schema, produced: &[&str], name: &str) -> Result<Expr> {
    if !produced.contains(&name) {
        let dtype = schema.get(name).ok_or_else(|| {
            PipelineError::schema("derive", format!("column '{name}' not found"))
        })?;
        if !(dtype.is_integer() || dtype.is_float()) {
            return Err(PipelineError::schema(
                "derive",
                format!("column '{name}' is {dtype}, expected a number"),
            ));
        }
    }
    Ok(col(name).cast(DataType::Float64))
}
