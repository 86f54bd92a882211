use polars::prelude::{ChunkAgg, DataFrame, DataType};
use tracing::error;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityCheck {
    /// The column must not sum to exactly zero across the unit. The
    /// provider sometimes publishes every expected-goals value as 0; a
    /// genuinely all-zero unit is possible but rare, and is rejected too.
    /// A unit with no rows at all has nothing to vouch for it and fails.
    NonZeroSum { column: &'static str },
}

pub fn validate(df: &DataFrame, checks: &[IntegrityCheck]) -> Result<()> {
    for check in checks {
        match *check {
            IntegrityCheck::NonZeroSum { column } => {
                if df.height() == 0 {
                    error!(column, "integrity check failed on an empty unit");
                    return Err(PipelineError::DataSourceDefect(format!(
                        "'{column}' has no rows to sum"
                    )));
                }
                let values = df.column(column)?.cast(&DataType::Float64)?;
                let total: f64 = values.as_materialized_series().f64()?.sum().unwrap_or(0.0);
                if total == 0.0 {
                    error!(column, rows = df.height(), "integrity check failed");
                    return Err(PipelineError::DataSourceDefect(format!(
                        "'{column}' sums to 0 across {} rows",
                        df.height()
                    )));
                }
            }
        }
    }
    Ok(())
}
