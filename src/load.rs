use std::fmt;

use polars::prelude::DataFrame;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::schema::{Destination, conform};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// The destination becomes exactly the loaded rows. Used for season refreshes.
    Replace,
    /// Rows are added to the existing destination. Loading the same game
    /// twice duplicates its rows.
    Append,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadMode::Replace => "replace",
            LoadMode::Append => "append",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub destination: String,
    pub mode: LoadMode,
    pub rows: usize,
}

/// Conforms `df` to the destination family schema and writes it. Nothing
/// is written unless every row conforms.
pub fn load(store: &mut Store, df: DataFrame, dest: &Destination, mode: LoadMode) -> Result<LoadReport> {
    load_batch(store, vec![(df, dest)], mode)?
        .pop()
        .ok_or_else(|| PipelineError::MissingDestination(dest.name.clone()))
}

/// Loads several destinations as one unit: every table is conformed and
/// every destination checked first, then all rows land in one transaction.
/// A failure anywhere leaves every destination untouched.
pub fn load_batch(
    store: &mut Store,
    batch: Vec<(DataFrame, &Destination)>,
    mode: LoadMode,
) -> Result<Vec<LoadReport>> {
    let conformed = batch
        .into_iter()
        .map(|(df, dest)| Ok((dest, conform(df, dest.family)?)))
        .collect::<Result<Vec<_>>>()?;
    let writes = conformed.iter().map(|(dest, df)| (*dest, df)).collect::<Vec<_>>();
    let counts = match mode {
        LoadMode::Replace => store.replace_all(&writes)?,
        LoadMode::Append => store.insert_all(&writes)?,
    };
    Ok(writes
        .iter()
        .zip(counts)
        .map(|((dest, _), rows)| {
            info!(table = %dest.name, %mode, rows, "loaded");
            LoadReport {
                destination: dest.name.clone(),
                mode,
                rows,
            }
        })
        .collect())
}
