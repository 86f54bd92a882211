use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::reconcile::{self, FailureKind, ReconciliationStrategy};
use crate::retrieval::{Retriever, read_file, render_url};
use crate::frame::{ColumnBuffer, frame_from_buffers};
use crate::schema::ColumnDef;

/// One retrieved tabular source, projected to the columns the pipeline reads.
#[derive(Debug, Clone)]
pub struct RawExtract {
    pub source_id: String,
    pub requested_columns: Vec<ColumnDef>,
    pub table: DataFrame,
}

/// Why a payload could not be projected directly.
#[derive(Debug)]
pub enum ExtractFailure {
    ColumnsNotFound {
        header: Vec<String>,
        missing: Vec<String>,
    },
    Fatal(PipelineError),
}

impl From<PipelineError> for ExtractFailure {
    fn from(err: PipelineError) -> Self {
        ExtractFailure::Fatal(err)
    }
}

/// Reads remote extracts by URL template, applying the schema reconciler
/// when the payload is drifted in a recognized way.
pub struct ExtractReader<'a> {
    retriever: &'a dyn Retriever,
    retries: u32,
}

impl<'a> ExtractReader<'a> {
    pub fn new(retriever: &'a dyn Retriever, retries: u32) -> Self {
        Self { retriever, retries }
    }

    /// `reference` names a structurally valid parameter value of the same
    /// template, used only when the payload has lost its header row.
    pub fn read(
        &self,
        template: &str,
        param: &str,
        reference: Option<&str>,
        requested: &[ColumnDef],
    ) -> Result<RawExtract> {
        let url = render_url(template, param);
        let bytes = reconcile::fetch_with_retry(self.retriever, &url, self.retries)?;
        debug!(url = %url, bytes = bytes.len(), "fetched extract");

        let (header, missing) = match parse_extract(&url, &bytes, requested) {
            Ok(extract) => return Ok(extract),
            Err(ExtractFailure::Fatal(err)) => return Err(err),
            Err(ExtractFailure::ColumnsNotFound { header, missing }) => (header, missing),
        };

        let kind = reconcile::classify_columns(&header, &missing);
        match ReconciliationStrategy::for_failure(&kind) {
            Some(ReconciliationStrategy::RenameColumns(renames)) => {
                warn!(url = %url, ?renames, "source columns renamed, applying aliases");
                finish(reconcile::apply_renames(&url, &bytes, &renames, requested))
            }
            Some(ReconciliationStrategy::BorrowHeader) => {
                let Some(reference) = reference.filter(|r| *r != param) else {
                    return Err(PipelineError::schema(
                        url,
                        "header row missing and no reference extract configured",
                    ));
                };
                let reference_url = render_url(template, reference);
                warn!(url = %url, reference = %reference_url, "header row missing, borrowing reference header");
                let reference_bytes =
                    reconcile::fetch_with_retry(self.retriever, &reference_url, self.retries)?;
                let reference_header = reconcile::reference_header(&reference_url, &reference_bytes)?;
                finish(reconcile::repair_missing_header(
                    &url,
                    &bytes,
                    &reference_header,
                    requested,
                ))
            }
            Some(ReconciliationStrategy::Retry) | None => Err(unrecognized(&url, &kind, &missing)),
        }
    }
}

/// Reads one local extract. Only the alias repair applies; there is no
/// reference for a file that lost its header.
pub fn read_local(path: &Path, requested: &[ColumnDef]) -> Result<RawExtract> {
    let source_id = path.display().to_string();
    let bytes = read_file(path)?;
    let (header, missing) = match parse_extract(&source_id, &bytes, requested) {
        Ok(extract) => return Ok(extract),
        Err(ExtractFailure::Fatal(err)) => return Err(err),
        Err(ExtractFailure::ColumnsNotFound { header, missing }) => (header, missing),
    };
    let kind = reconcile::classify_columns(&header, &missing);
    match ReconciliationStrategy::for_failure(&kind) {
        Some(ReconciliationStrategy::RenameColumns(renames)) => {
            warn!(path = %source_id, ?renames, "source columns renamed, applying aliases");
            finish(reconcile::apply_renames(&source_id, &bytes, &renames, requested))
        }
        _ => Err(unrecognized(&source_id, &kind, &missing)),
    }
}

fn unrecognized(source_id: &str, kind: &FailureKind, missing: &[String]) -> PipelineError {
    let detail = match kind {
        FailureKind::MissingHeader => "header row missing".to_string(),
        _ => format!("requested columns not found: {missing:?}"),
    };
    PipelineError::schema(source_id, detail)
}

fn finish(outcome: Result<RawExtract, ExtractFailure>) -> Result<RawExtract> {
    outcome.map_err(|failure| match failure {
        ExtractFailure::Fatal(err) => err,
        ExtractFailure::ColumnsNotFound { missing, .. } => PipelineError::schema(
            "reconciled extract",
            format!("requested columns still missing: {missing:?}"),
        ),
    })
}

/// Direct parse: first record is the header.
pub fn parse_extract(
    source_id: &str,
    bytes: &[u8],
    requested: &[ColumnDef],
) -> Result<RawExtract, ExtractFailure> {
    let records = read_records(bytes)?;
    let Some((header, rows)) = records.split_first() else {
        return Err(PipelineError::schema(source_id, "empty payload").into());
    };
    let header = normalize_header(header);
    project(source_id, &header, rows, 0, requested)
}

pub(crate) fn read_records(bytes: &[u8]) -> Result<Vec<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut out = Vec::new();
    for record in reader.records() {
        out.push(record?);
    }
    Ok(out)
}

pub(crate) fn normalize_header(record: &StringRecord) -> Vec<String> {
    record
        .iter()
        .map(|cell| cell.trim_start_matches('\u{feff}').trim().to_string())
        .collect()
}

/// Projects `rows` down to `requested`, parsing each cell to its declared
/// type. `skip_leading` fields are dropped from the front of every row
/// before aligning with `header`.
pub(crate) fn project(
    source_id: &str,
    header: &[String],
    rows: &[StringRecord],
    skip_leading: usize,
    requested: &[ColumnDef],
) -> Result<RawExtract, ExtractFailure> {
    let missing = requested
        .iter()
        .filter(|c| !header.iter().any(|h| h == c.name))
        .map(|c| c.name.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ExtractFailure::ColumnsNotFound {
            header: header.to_vec(),
            missing,
        });
    }

    let indices = requested
        .iter()
        .map(|c| header.iter().position(|h| h == c.name).unwrap_or_default())
        .collect::<Vec<_>>();
    let expected_width = header.len() + skip_leading;

    let mut buffers = requested
        .iter()
        .map(|c| ColumnBuffer::new(c.ty, rows.len()))
        .collect::<Vec<_>>();
    for (line, record) in rows.iter().enumerate() {
        if record.len() != expected_width {
            return Err(PipelineError::schema(
                source_id,
                format!(
                    "row {} has {} fields, expected {expected_width}",
                    line + 1,
                    record.len()
                ),
            )
            .into());
        }
        for ((def, &idx), buffer) in requested.iter().zip(&indices).zip(&mut buffers) {
            let raw = record.get(skip_leading + idx).unwrap_or("");
            buffer.push_raw(def.name, raw)?;
        }
    }
    let table = frame_from_buffers(
        requested
            .iter()
            .map(|c| c.name)
            .zip(buffers)
            .collect(),
    )?;

    Ok(RawExtract {
        source_id: source_id.to_string(),
        requested_columns: requested.to_vec(),
        table,
    })
}
