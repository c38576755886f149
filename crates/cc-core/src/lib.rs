//! Content Classifier Core Library
//!
//! This crate provides the data model and the matching engine that decide
//! whether a network request should be blocked, annotated or exempted.
//!
//! # Architecture
//!
//! Filter lists are compiled (by `cc-compiler`) into an immutable
//! [`CompiledEngine`]: a host-suffix index for domain-anchored rules plus a
//! token index for the residual URL patterns. The [`Matcher`] walks those
//! indexes for one [`ClassificationRequest`] and yields a
//! [`ClassificationResult`]. Results from several engines are folded with
//! [`ClassificationResult::accumulate`].
//!
//! # Modules
//!
//! - `hash`: xxHash helpers for index maps and URL tokens
//! - `psl`: site resolution and host suffix walking
//! - `url`: fast URL slicing without allocations
//! - `engine`: the compiled, immutable rule structure
//! - `matcher`: request evaluation
//! - `request` / `result`: the request descriptor and the result fold
//! - `types`: shared type definitions

pub mod engine;
pub mod hash;
pub mod matcher;
pub mod psl;
pub mod request;
pub mod result;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use engine::{CompiledEngine, EngineError, EngineParts, Rule, RuleTarget};
pub use matcher::{evaluate, Matcher};
pub use psl::{HeuristicSiteResolver, PublicSuffixResolver, SiteResolver};
pub use request::ClassificationRequest;
pub use result::{ClassificationResult, Outcome, Verdict};
pub use types::{ResourceType, RuleAction, RuleFlags, TypeMask};
