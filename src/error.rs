use thiserror::Error;

use crate::schema::ColumnType;

/// Failure taxonomy for one aggregation unit. Every variant aborts the unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source '{source_id}' unavailable after {attempts} attempts: {reason}")]
    SourceUnavailable {
        source_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("schema mismatch in {origin}: {detail}")]
    SchemaMismatch { origin: String, detail: String },

    #[error("data source defect: {0}")]
    DataSourceDefect(String),

    #[error("no raw extracts matched {0}")]
    EmptyExtractSet(String),

    #[error("duplicate entity key ({key}) in {origin}")]
    DuplicateEntityKey { origin: String, key: String },

    #[error("cannot read {value:?} in column '{column}' as {ty}")]
    InvalidValue {
        column: String,
        value: String,
        ty: ColumnType,
    },

    #[error("unrecognized game state label '{0}'")]
    UnknownGameState(String),

    #[error("destination table '{0}' does not exist")]
    MissingDestination(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl PipelineError {
    pub fn schema(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            origin: origin.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
