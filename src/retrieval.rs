use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use thiserror::Error;

use crate::error::{PipelineError, Result};

/// A failed retrieval attempt. Distinct from an empty payload, which is data.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("http {status}")]
    Status { status: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Source of raw extract bytes.
pub trait Retriever {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpRetriever {
    client: &'static Client,
}

impl HttpRetriever {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::http_client::http_client()?,
        })
    }
}

impl Retriever for HttpRetriever {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|err| FetchError::Transport(err.to_string()))
    }
}

/// Expands a `{}` placeholder in a source template.
pub fn render_url(template: &str, param: &str) -> String {
    template.replace("{}", param)
}

/// Lists `*.csv` files directly under `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(PipelineError::from)
}
