//! Fetching and compiling filter lists.
//!
//! Fetching is delegated to a [`ListFetcher`]; every list of a load is
//! fetched concurrently and compiled on its own, so one broken list never
//! takes the others down.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use cc_core::CompiledEngine;

use crate::engine_set::lock;

/// Lists fetched at once during a load.
const CONCURRENT_FETCHES: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no list available at {0}")]
    NotFound(String),
    #[error("unsupported list url: {0}")]
    UnsupportedUrl(String),
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request for {url} failed: {message}")]
    Http { url: String, message: String },
}

/// Source of raw filter list bytes.
#[async_trait]
pub trait ListFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by a map of url → list bytes.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    lists: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        lock(&self.lists).insert(url.into(), body.into());
    }

    pub fn remove(&self, url: &str) -> Option<Vec<u8>> {
        lock(&self.lists).remove(url)
    }
}

#[async_trait]
impl ListFetcher for InMemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        lock(&self.lists)
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// Split a fetched list into candidate rule lines.
///
/// Bytes are decoded lossily as UTF-8 and split on `\n`; empty segments
/// are dropped.
pub fn split_rules(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome counts for one purpose of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListStats {
    pub configured: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Fetch and compile `urls`. Engines come back in configured order; lists
/// that fail to fetch or compile are logged and left out.
pub async fn load_engines(fetcher: &dyn ListFetcher, urls: &[String]) -> (Vec<CompiledEngine>, ListStats) {
    let fetches: Vec<_> = urls.iter().map(|url| fetcher.fetch(url)).collect();
    let bodies: Vec<_> = stream::iter(fetches)
        .buffered(CONCURRENT_FETCHES)
        .collect()
        .await;

    let mut stats = ListStats {
        configured: urls.len(),
        ..ListStats::default()
    };
    let mut engines = Vec::with_capacity(urls.len());

    for (url, body) in urls.iter().zip(bodies) {
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                log::warn!("failed to fetch filter list {}: {}", url, err);
                stats.failed += 1;
                continue;
            }
        };

        let lines = split_rules(&body);
        match cc_compiler::compile_with_report(&lines) {
            Ok((engine, report)) => {
                log::debug!(
                    "loaded {}: {} rules from {} lines ({} skipped)",
                    url,
                    report.rules,
                    report.lines,
                    report.skipped
                );
                stats.loaded += 1;
                engines.push(engine);
            }
            Err(err) => {
                log::warn!("failed to compile filter list {}: {}", url, err);
                stats.failed += 1;
            }
        }
    }

    (engines, stats)
}
