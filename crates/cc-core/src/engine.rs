//! Compiled engine structure
//!
//! A [`CompiledEngine`] is the immutable, in-memory result of compiling one
//! filter list. It holds the rules and three indexes into them:
//!
//! - `host_index`: anchor host → rules anchored at that host (tier a)
//! - `token_index`: URL token hash → residual rules containing that token
//! - `untokenized`: residual rules with no usable token, always scanned
//!
//! Every rule lives in exactly one index. Nothing is mutated after
//! [`CompiledEngine::from_parts`] returns, so the engine can be shared
//! across threads without locking.

use regex::Regex;

use crate::hash::FastMap;
use crate::types::{PartyMask, RuleAction, RuleFlags, SchemeMask, TypeMask};

/// Index of a rule in [`CompiledEngine::rules`].
pub type RuleId = u32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{index} index references rule {rule_id}, but only {rule_count} rules exist")]
    DanglingRule {
        index: &'static str,
        rule_id: RuleId,
        rule_count: usize,
    },
    #[error("too many rules: {0}")]
    TooManyRules(usize),
}

// =============================================================================
// Rules
// =============================================================================

/// `$domain=` constraint, matched against the request's source site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DomainConstraint {
    pub include: Vec<Box<str>>,
    pub exclude: Vec<Box<str>>,
}

/// Where a pattern may start matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternStart {
    /// Anywhere in the URL
    Anywhere,
    /// At the first byte of the URL (`|`)
    UrlStart,
    /// At the start of a host label (`||` without an indexable host)
    HostLabel,
    /// Immediately after the request host (rest of an indexed `||host...`)
    HostEnd,
}

/// One step of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternOp {
    /// Literal bytes, lowercased unless the rule is `$match-case`
    Literal(Box<str>),
    /// `*` - any run of bytes
    Wildcard,
    /// `^` - one separator byte, or the end of the URL
    Separator,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub start: PatternStart,
    pub ops: Vec<PatternOp>,
    /// Pattern must end at the end of the URL (`|` suffix)
    pub end_anchor: bool,
}

/// What a rule matches against.
#[derive(Debug, Clone)]
pub enum RuleTarget {
    /// `||host^`, `||host/path`, hosts-file lines. Indexed by `host`.
    Host { host: Box<str>, rest: Option<Pattern> },
    /// URL pattern without an indexable host.
    Pattern(Pattern),
    /// `/regex/` over the URL.
    Regex(Regex),
}

/// One compiled filter directive.
#[derive(Debug, Clone)]
pub struct Rule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    /// Empty means any resource type
    pub type_mask: TypeMask,
    /// Empty means any party
    pub party_mask: PartyMask,
    /// Empty means any scheme
    pub scheme_mask: SchemeMask,
    pub domain_constraint: Option<DomainConstraint>,
    pub target: RuleTarget,
}

impl Rule {
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.action == RuleAction::Allow
    }

    /// Important blocking rule. `$important` on an exception has no effect.
    #[inline]
    pub fn is_important_block(&self) -> bool {
        self.action == RuleAction::Block && self.flags.contains(RuleFlags::IMPORTANT)
    }

    #[inline]
    pub fn match_case(&self) -> bool {
        self.flags.contains(RuleFlags::MATCH_CASE)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Raw pieces handed over by the compiler.
#[derive(Debug, Default)]
pub struct EngineParts {
    pub rules: Vec<Rule>,
    pub host_index: FastMap<Box<str>, Vec<RuleId>>,
    pub token_index: FastMap<u64, Vec<RuleId>>,
    pub untokenized: Vec<RuleId>,
}

/// Summary counts for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub rules: usize,
    pub hosts: usize,
    pub tokens: usize,
    pub untokenized: usize,
}

/// Immutable compiled rule set.
#[derive(Debug, Default)]
pub struct CompiledEngine {
    rules: Vec<Rule>,
    host_index: FastMap<Box<str>, Vec<RuleId>>,
    token_index: FastMap<u64, Vec<RuleId>>,
    untokenized: Vec<RuleId>,
}

impl CompiledEngine {
    /// An engine that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble an engine, verifying that every index entry points at a rule.
    pub fn from_parts(parts: EngineParts) -> Result<Self, EngineError> {
        let rule_count = parts.rules.len();
        if RuleId::try_from(rule_count).is_err() {
            return Err(EngineError::TooManyRules(rule_count));
        }

        let check = |index: &'static str, ids: &[RuleId]| -> Result<(), EngineError> {
            match ids.iter().find(|&&id| id as usize >= rule_count) {
                Some(&rule_id) => Err(EngineError::DanglingRule {
                    index,
                    rule_id,
                    rule_count,
                }),
                None => Ok(()),
            }
        };

        for ids in parts.host_index.values() {
            check("host", ids)?;
        }
        for ids in parts.token_index.values() {
            check("token", ids)?;
        }
        check("untokenized", &parts.untokenized)?;

        Ok(Self {
            rules: parts.rules,
            host_index: parts.host_index,
            token_index: parts.token_index,
            untokenized: parts.untokenized,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    /// Rules anchored at exactly `host`.
    #[inline]
    pub fn host_rules(&self, host: &str) -> &[RuleId] {
        self.host_index.get(host).map_or(&[], Vec::as_slice)
    }

    /// Residual rules indexed under a token hash.
    #[inline]
    pub fn token_rules(&self, token: u64) -> &[RuleId] {
        self.token_index.get(&token).map_or(&[], Vec::as_slice)
    }

    /// Residual rules scanned for every request.
    #[inline]
    pub fn untokenized_rules(&self) -> &[RuleId] {
        &self.untokenized
    }

    pub fn has_token_rules(&self) -> bool {
        !self.token_index.is_empty()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            rules: self.rules.len(),
            hosts: self.host_index.len(),
            tokens: self.token_index.len(),
            untokenized: self.untokenized.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_rule(host: &str) -> Rule {
        Rule {
            action: RuleAction::Block,
            flags: RuleFlags::empty(),
            type_mask: TypeMask::empty(),
            party_mask: PartyMask::empty(),
            scheme_mask: SchemeMask::empty(),
            domain_constraint: None,
            target: RuleTarget::Host {
                host: host.into(),
                rest: None,
            },
        }
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledEngine>();
    }

    #[test]
    fn test_from_parts_accepts_valid_index() {
        let mut parts = EngineParts {
            rules: vec![host_rule("tracker.example")],
            ..EngineParts::default()
        };
        parts.host_index.insert("tracker.example".into(), vec![0]);

        let engine = CompiledEngine::from_parts(parts).expect("valid parts");
        assert_eq!(engine.rule_count(), 1);
        assert_eq!(engine.host_rules("tracker.example"), &[0]);
        assert!(engine.host_rules("other.example").is_empty());
    }

    #[test]
    fn test_from_parts_rejects_dangling_ids() {
        let mut parts = EngineParts {
            rules: vec![host_rule("tracker.example")],
            ..EngineParts::default()
        };
        parts.untokenized.push(3);

        let err = CompiledEngine::from_parts(parts).unwrap_err();
        assert_eq!(
            err,
            EngineError::DanglingRule {
                index: "untokenized",
                rule_id: 3,
                rule_count: 1,
            }
        );
    }

    #[test]
    fn test_important_exception_is_not_important_block() {
        let mut rule = host_rule("tracker.example");
        rule.flags = RuleFlags::IMPORTANT;
        assert!(rule.is_important_block());
        rule.action = RuleAction::Allow;
        assert!(!rule.is_important_block());
        assert!(rule.is_exception());
    }
}
