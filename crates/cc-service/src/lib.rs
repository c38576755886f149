//! Content Classifier Service
//!
//! Owns the compiled engines for the block and annotate purposes, reloads
//! them asynchronously from configured filter lists and serves synchronous
//! classification to the request pipeline.
//!
//! - `engine_set`: generation-tagged hot swap and the cross-engine fold
//! - `loader`: list fetching, splitting and per-list compilation
//! - `service`: lifecycle and the classify entry points
//! - `config`: JSON configuration

pub mod config;
pub mod engine_set;
pub mod error;
pub mod loader;
pub mod service;

pub use config::{parse_list_urls, ConfigError, ServiceConfig};
pub use engine_set::{EngineGeneration, EngineSet, Purpose};
pub use error::ServiceError;
pub use loader::{load_engines, split_rules, FetchError, InMemoryFetcher, ListFetcher, ListStats};
pub use service::{ClassificationService, InitPhase, LoadSummary};
