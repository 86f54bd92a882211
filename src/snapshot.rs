use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::info;

use crate::http_client::http_client;

/// One stored copy of the database, as listed by the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotMeta {
    pub id: u64,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(default)]
    artifacts: Vec<SnapshotMeta>,
}

pub trait SnapshotSource {
    fn list(&self) -> Result<Vec<SnapshotMeta>>;
    fn download(&self, meta: &SnapshotMeta) -> Result<Vec<u8>>;
}

pub fn parse_listing(raw: &str) -> Result<Vec<SnapshotMeta>> {
    let listing: ArtifactListing =
        serde_json::from_str(raw.trim()).context("invalid artifact listing json")?;
    Ok(listing.artifacts)
}

/// The unexpired snapshot named `name` with the greatest `updated_at`.
pub fn select_latest<'a>(snapshots: &'a [SnapshotMeta], name: &str) -> Option<&'a SnapshotMeta> {
    snapshots
        .iter()
        .filter(|s| s.name == name && !s.expired)
        .max_by_key(|s| s.updated_at)
}

/// Downloads the most recent snapshot named `name` into `dest`. Returns
/// `None` when the store holds no such snapshot.
pub fn fetch_latest_snapshot(
    source: &dyn SnapshotSource,
    name: &str,
    dest: &Path,
) -> Result<Option<SnapshotMeta>> {
    let snapshots = source.list()?;
    let Some(latest) = select_latest(&snapshots, name) else {
        return Ok(None);
    };
    let bytes = source.download(latest)?;
    if let Some(dir) = dest.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::write(dest, &bytes).with_context(|| format!("write {}", dest.display()))?;
    info!(id = latest.id, updated_at = %latest.updated_at, dest = %dest.display(), "downloaded snapshot");
    Ok(Some(latest.clone()))
}

pub struct HttpSnapshotSource {
    listing_url: String,
    token: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(listing_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            token,
        }
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut req = http_client()?
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().with_context(|| format!("request {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("http {status} for {url}"));
        }
        Ok(resp)
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn list(&self) -> Result<Vec<SnapshotMeta>> {
        let body = self
            .get(&self.listing_url)?
            .text()
            .context("failed reading artifact listing")?;
        parse_listing(&body)
    }

    fn download(&self, meta: &SnapshotMeta) -> Result<Vec<u8>> {
        let bytes = self
            .get(&meta.archive_download_url)?
            .bytes()
            .context("failed reading snapshot body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "total_count": 3,
        "artifacts": [
            {"id": 1, "name": "hockey-stats-db", "updated_at": "2025-01-02T08:00:00Z",
             "archive_download_url": "https://example.test/1", "expired": false},
            {"id": 2, "name": "hockey-stats-db", "updated_at": "2025-01-03T08:00:00Z",
             "archive_download_url": "https://example.test/2", "expired": false},
            {"id": 3, "name": "other", "updated_at": "2025-02-01T08:00:00Z",
             "archive_download_url": "https://example.test/3"}
        ]
    }"#;

    #[test]
    fn latest_is_max_updated_at_for_name() {
        let snapshots = parse_listing(LISTING).unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(select_latest(&snapshots, "hockey-stats-db").map(|s| s.id), Some(2));
        assert!(select_latest(&snapshots, "missing").is_none());
    }

    #[test]
    fn expired_snapshots_are_skipped() {
        let mut snapshots = parse_listing(LISTING).unwrap();
        snapshots[1].expired = true;
        assert_eq!(select_latest(&snapshots, "hockey-stats-db").map(|s| s.id), Some(1));
    }
}
