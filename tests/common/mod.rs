#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;

use hockey_stats::retrieval::{FetchError, Retriever};

pub fn fixture_path(parts: &[&str]) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    for part in parts {
        path.push(part);
    }
    path
}

pub fn read_fixture(parts: &[&str]) -> Vec<u8> {
    fs::read(fixture_path(parts)).expect("fixture file should be readable")
}

/// In-memory retriever. Scripted outcomes are consumed first, then the
/// steady response for the url is served; unknown urls answer 404.
#[derive(Default)]
pub struct ScriptedRetriever {
    scripted: RefCell<HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
    steady: HashMap<String, Vec<u8>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.steady.insert(url.into(), body);
        self
    }

    pub fn then(self, url: impl Into<String>, outcome: Result<Vec<u8>, FetchError>) -> Self {
        self.scripted
            .borrow_mut()
            .entry(url.into())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == url).count()
    }
}

impl Retriever for ScriptedRetriever {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.borrow_mut().push(url.to_string());
        if let Some(outcome) = self
            .scripted
            .borrow_mut()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
        {
            return outcome;
        }
        self.steady
            .get(url)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}
