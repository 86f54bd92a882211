//! Schema reconciler: classifies why an extract could not be read and picks
//! one of a fixed set of repair strategies. Anything it cannot classify is
//! left to the caller as a fatal schema mismatch.

use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::extract::{ExtractFailure, RawExtract, normalize_header, project, read_records};
use crate::retrieval::{FetchError, Retriever};
use crate::schema::ColumnDef;

/// Labels the provider has used for the same column across seasons.
const COLUMN_ALIASES: &[&[&str]] = &[
    &["icetime", "iceTime"],
    &["games_played", "gamesPlayed"],
    &["playerId", "playerID"],
    &["gameId", "gameID"],
    &["penalityMinutesFor", "penaltyMinutesFor"],
    &["penalityMinutesAgainst", "penaltyMinutesAgainst"],
    &["First Assists", "First Assist"],
    &["Second Assists", "Second Assist"],
];

#[derive(Debug, Clone)]
pub enum FailureKind {
    Transport(FetchError),
    /// The first record is data, not a header.
    MissingHeader,
    /// Every missing column is present under a known alias: `(found, requested)`.
    RenamedColumns(Vec<(String, String)>),
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationStrategy {
    Retry,
    BorrowHeader,
    RenameColumns(Vec<(String, String)>),
}

impl ReconciliationStrategy {
    pub fn for_failure(kind: &FailureKind) -> Option<Self> {
        match kind {
            FailureKind::Transport(_) => Some(ReconciliationStrategy::Retry),
            FailureKind::MissingHeader => Some(ReconciliationStrategy::BorrowHeader),
            FailureKind::RenamedColumns(renames) => {
                Some(ReconciliationStrategy::RenameColumns(renames.clone()))
            }
            FailureKind::Unrecognized => None,
        }
    }
}

/// Classifies a header that lacks some requested columns.
pub fn classify_columns(header: &[String], missing: &[String]) -> FailureKind {
    if looks_like_data(header) {
        return FailureKind::MissingHeader;
    }
    let mut renames = Vec::with_capacity(missing.len());
    for wanted in missing {
        match header.iter().find(|h| is_alias(h, wanted)) {
            Some(found) => renames.push((found.clone(), wanted.clone())),
            None => return FailureKind::Unrecognized,
        }
    }
    FailureKind::RenamedColumns(renames)
}

fn is_alias(found: &str, wanted: &str) -> bool {
    if found == wanted {
        return false;
    }
    if found.eq_ignore_ascii_case(wanted) {
        return true;
    }
    COLUMN_ALIASES
        .iter()
        .any(|group| group.contains(&found) && group.contains(&wanted))
}

// A header row never has a majority of numeric cells.
fn looks_like_data(header: &[String]) -> bool {
    if header.is_empty() {
        return false;
    }
    let numeric = header
        .iter()
        .filter(|cell| !cell.is_empty() && cell.parse::<f64>().is_ok())
        .count();
    numeric * 2 >= header.len()
}

/// Fetches `url`, retrying immediately up to `retries` more times.
pub fn fetch_with_retry(retriever: &dyn Retriever, url: &str, retries: u32) -> Result<Vec<u8>> {
    let attempts = retries + 1;
    let mut last_err: Option<FetchError> = None;
    for attempt in 1..=attempts {
        match retriever.fetch(url) {
            Ok(bytes) => return Ok(bytes),
            // Status and transport failures are both retried.
            Err(err) => {
                if attempt < attempts {
                    warn!(url, attempt, error = %err, "fetch failed, retrying");
                }
                last_err = Some(err);
            }
        }
    }
    Err(PipelineError::SourceUnavailable {
        source_id: url.to_string(),
        attempts,
        reason: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string()),
    })
}

pub fn apply_renames(
    source_id: &str,
    bytes: &[u8],
    renames: &[(String, String)],
    requested: &[ColumnDef],
) -> Result<RawExtract, ExtractFailure> {
    let records = read_records(bytes)?;
    let Some((header, rows)) = records.split_first() else {
        return Err(PipelineError::schema(source_id, "empty payload").into());
    };
    let mut header = normalize_header(header);
    for cell in &mut header {
        if let Some((_, to)) = renames.iter().find(|(from, _)| from == cell) {
            *cell = to.clone();
        }
    }
    project(source_id, &header, rows, 0, requested)
}

/// Header row of a known-good extract of the same source family.
pub fn reference_header(source_id: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let records = read_records(bytes)?;
    let header = records
        .first()
        .map(normalize_header)
        .ok_or_else(|| PipelineError::schema(source_id, "reference extract is empty"))?;
    if looks_like_data(&header) {
        return Err(PipelineError::schema(
            source_id,
            "reference extract has no header row either",
        ));
    }
    Ok(header)
}

/// Rebuilds a headerless payload: every record is data, and its first field
/// is a duplicated artifact that is discarded before aligning with the
/// reference header.
pub fn repair_missing_header(
    source_id: &str,
    bytes: &[u8],
    reference_header: &[String],
    requested: &[ColumnDef],
) -> Result<RawExtract, ExtractFailure> {
    let records = read_records(bytes)?;
    project(source_id, reference_header, &records, 1, requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn numeric_first_row_is_missing_header() {
        let header = strings(&["0", "8478402", "2024", "Connor McDavid", "EDM", "C", "all", "82"]);
        assert!(matches!(
            classify_columns(&header, &strings(&["playerId"])),
            FailureKind::MissingHeader
        ));
    }

    #[test]
    fn aliases_resolve_renamed_columns() {
        let header = strings(&["playerID", "name", "iceTime"]);
        let kind = classify_columns(&header, &strings(&["playerId", "icetime"]));
        match kind {
            FailureKind::RenamedColumns(renames) => assert_eq!(
                renames,
                vec![
                    ("playerID".to_string(), "playerId".to_string()),
                    ("iceTime".to_string(), "icetime".to_string())
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transport_failures_are_retried() {
        let kind = FailureKind::Transport(FetchError::Status { status: 500 });
        assert_eq!(
            ReconciliationStrategy::for_failure(&kind),
            Some(ReconciliationStrategy::Retry)
        );
    }

    #[test]
    fn unknown_missing_column_is_unrecognized() {
        let header = strings(&["name", "team"]);
        let kind = classify_columns(&header, &strings(&["xGoals"]));
        assert!(ReconciliationStrategy::for_failure(&kind).is_none());
    }
}
