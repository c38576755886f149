//! Core Matching Engine
//!
//! This is the hot path - every classified request goes through here.
//! Evaluation only reads the compiled engine; no locks, no I/O.
//!
//! Precedence, strongest first: important block, exception, block, nothing.

use std::borrow::Cow;

use crate::engine::{CompiledEngine, Pattern, PatternOp, PatternStart, Rule, RuleId, RuleTarget};
use crate::psl::{is_same_or_subdomain, walk_host_suffixes};
use crate::request::ClassificationRequest;
use crate::result::{ClassificationResult, Outcome, Verdict};
use crate::types::{PartyMask, SchemeMask, TypeMask};
use crate::url::{extract_scheme, get_host_position, is_boundary_char, tokenize_url};

/// Evaluate a request against an engine that may not be built yet.
pub fn evaluate(engine: Option<&CompiledEngine>, request: &ClassificationRequest) -> ClassificationResult {
    match engine {
        Some(engine) => Matcher::new(engine).evaluate(request),
        None => ClassificationResult::failure(Outcome::NotInitialized),
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// Evaluates requests against one compiled engine.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    engine: &'a CompiledEngine,
}

/// A rule id in an index had no rule behind it.
#[derive(Debug)]
struct MissingRule(RuleId);

impl<'a> Matcher<'a> {
    pub fn new(engine: &'a CompiledEngine) -> Self {
        Self { engine }
    }

    /// Classify one request.
    pub fn evaluate(&self, request: &ClassificationRequest) -> ClassificationResult {
        if !request.is_valid() {
            return ClassificationResult::failure(Outcome::InvalidArgument);
        }

        // First-party resources are never classified.
        if !request.is_third_party() {
            return ClassificationResult::success(Verdict::NoMatch);
        }

        let ctx = MatchContext::new(request);
        match self.match_rules(&ctx) {
            Ok(precedence) => ClassificationResult::success(precedence.verdict()),
            Err(MissingRule(rule_id)) => {
                log::error!(
                    "compiled engine references missing rule {} (url={})",
                    rule_id,
                    request.url()
                );
                ClassificationResult::failure(Outcome::InternalError)
            }
        }
    }

    fn match_rules(&self, ctx: &MatchContext<'_>) -> Result<Precedence, MissingRule> {
        let mut precedence = Precedence::default();

        // Tier a: rules anchored at the host or one of its parents
        for suffix in walk_host_suffixes(&ctx.host) {
            if self.check_rules(self.engine.host_rules(suffix), ctx, &mut precedence)? {
                return Ok(precedence);
            }
        }

        // Tier b: residual rules, narrowed by URL token when possible
        if self.engine.has_token_rules() {
            let mut tokens: Vec<u64> = tokenize_url(&ctx.url_lower).collect();
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                if self.check_rules(self.engine.token_rules(token), ctx, &mut precedence)? {
                    return Ok(precedence);
                }
            }
        }

        self.check_rules(self.engine.untokenized_rules(), ctx, &mut precedence)?;

        Ok(precedence)
    }

    /// Record every matching rule. Returns true once the decision is final.
    fn check_rules(
        &self,
        rule_ids: &[RuleId],
        ctx: &MatchContext<'_>,
        precedence: &mut Precedence,
    ) -> Result<bool, MissingRule> {
        for &rule_id in rule_ids {
            let rule = self.engine.rule(rule_id).ok_or(MissingRule(rule_id))?;

            if !check_rule_options(rule, ctx) || !target_matches(rule, ctx) {
                continue;
            }

            precedence.record(rule);
            if precedence.important {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// =============================================================================
// Match Context
// =============================================================================

/// Per-request values derived once before walking the indexes.
struct MatchContext<'r> {
    url: &'r str,
    url_lower: Cow<'r, str>,
    host: Cow<'r, str>,
    host_range: Option<(usize, usize)>,
    scheme: Option<SchemeMask>,
    type_mask: TypeMask,
    party: PartyMask,
    source_site: &'r str,
}

impl<'r> MatchContext<'r> {
    fn new(request: &'r ClassificationRequest) -> Self {
        let url = request.url();
        let url_lower = if url.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(url.to_ascii_lowercase())
        } else {
            Cow::Borrowed(url)
        };

        let host_range = get_host_position(url);
        let host = match host_range {
            Some((start, end)) => Cow::Owned(url_lower[start..end].trim_end_matches('.').to_string()),
            None => Cow::Borrowed(request.schemeless_site()),
        };

        let party = if request.is_third_party() {
            PartyMask::THIRD_PARTY
        } else {
            PartyMask::FIRST_PARTY
        };

        Self {
            url,
            url_lower,
            host,
            host_range,
            scheme: extract_scheme(url),
            type_mask: request.resource_type().mask(),
            party,
            source_site: request.source_schemeless_site(),
        }
    }
}

// =============================================================================
// Precedence
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct Precedence {
    block: bool,
    exception: bool,
    important: bool,
}

impl Precedence {
    fn record(&mut self, rule: &Rule) {
        if rule.is_exception() {
            self.exception = true;
        } else if rule.is_important_block() {
            self.important = true;
        } else {
            self.block = true;
        }
    }

    fn verdict(&self) -> Verdict {
        if self.important {
            Verdict::Matched {
                exception: false,
                important: true,
            }
        } else if self.block {
            Verdict::Matched {
                exception: self.exception,
                important: false,
            }
        } else {
            Verdict::NoMatch
        }
    }
}

// =============================================================================
// Rule Checks
// =============================================================================

/// Check if a rule's options match the request context.
fn check_rule_options(rule: &Rule, ctx: &MatchContext<'_>) -> bool {
    if !rule.type_mask.is_empty() && !rule.type_mask.intersects(ctx.type_mask) {
        return false;
    }

    if !rule.party_mask.is_empty() && !rule.party_mask.intersects(ctx.party) {
        return false;
    }

    if !rule.scheme_mask.is_empty() {
        match ctx.scheme {
            Some(scheme) if rule.scheme_mask.intersects(scheme) => {}
            _ => return false,
        }
    }

    match &rule.domain_constraint {
        Some(constraint) => {
            let related = |domain: &str| {
                !ctx.source_site.is_empty() && is_same_or_subdomain(ctx.source_site, domain)
            };
            if !constraint.include.is_empty() && !constraint.include.iter().any(|d| related(&**d)) {
                return false;
            }
            !constraint.exclude.iter().any(|d| related(&**d))
        }
        None => true,
    }
}

fn target_matches(rule: &Rule, ctx: &MatchContext<'_>) -> bool {
    let haystack = if rule.match_case() {
        ctx.url.as_bytes()
    } else {
        ctx.url_lower.as_bytes()
    };

    match &rule.target {
        RuleTarget::Host { host, rest } => {
            is_same_or_subdomain(&ctx.host, host)
                && rest
                    .as_ref()
                    .map_or(true, |pattern| pattern_matches(pattern, haystack, ctx.host_range))
        }
        RuleTarget::Pattern(pattern) => pattern_matches(pattern, haystack, ctx.host_range),
        RuleTarget::Regex(re) => re.is_match(ctx.url),
    }
}

// =============================================================================
// Pattern Verification
// =============================================================================

/// Verify a URL against a compiled pattern.
///
/// Runs in O(url × pattern): wildcards split the pattern into fixed-width
/// segments and each segment after a wildcard takes its leftmost match.
pub fn pattern_matches(pattern: &Pattern, url: &[u8], host_range: Option<(usize, usize)>) -> bool {
    let ops = pattern.ops.as_slice();
    let end = pattern.end_anchor;

    match pattern.start {
        PatternStart::UrlStart => match_ops(ops, url, 0, end, false),
        PatternStart::HostEnd => host_range.is_some_and(|(_, host_end)| match_ops(ops, url, host_end, end, false)),
        PatternStart::HostLabel => host_range.is_some_and(|(host_start, host_end)| {
            (host_start..host_end)
                .filter(|&i| i == host_start || url[i - 1] == b'.')
                .any(|i| match_ops(ops, url, i, end, false))
        }),
        PatternStart::Anywhere => match_ops(ops, url, 0, end, true),
    }
}

/// Match `ops` from `pos`. With `floating` the first segment may start
/// anywhere at or after `pos`.
fn match_ops(ops: &[PatternOp], url: &[u8], mut pos: usize, end_anchor: bool, mut floating: bool) -> bool {
    let mut segments = ops.split(|op| matches!(op, PatternOp::Wildcard)).peekable();

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();

        if !floating {
            pos = match match_segment(segment, url, pos) {
                Some(next) => next,
                None => return false,
            };
            if last {
                return !end_anchor || pos == url.len();
            }
        } else if last && end_anchor {
            return (pos..=url.len()).any(|p| match_segment(segment, url, p) == Some(url.len()));
        } else {
            pos = match find_segment(segment, url, pos) {
                Some(next) => next,
                None => return false,
            };
        }

        floating = true;
    }

    true
}

/// Leftmost match of `segment` starting at or after `from`. Returns the
/// position just past it.
fn find_segment(segment: &[PatternOp], url: &[u8], from: usize) -> Option<usize> {
    match segment.first() {
        Some(PatternOp::Literal(lit)) if !lit.is_empty() => {
            let lit = lit.as_bytes();
            let mut from = from;
            while let Some(found) = url.get(from..).and_then(|tail| find_bytes(tail, lit)) {
                if let Some(next) = match_segment(segment, url, from + found) {
                    return Some(next);
                }
                from += found + 1;
            }
            None
        }
        _ => (from..=url.len()).find_map(|p| match_segment(segment, url, p)),
    }
}

/// Match a wildcard-free run of ops exactly at `pos`.
fn match_segment(segment: &[PatternOp], url: &[u8], mut pos: usize) -> Option<usize> {
    for op in segment {
        match op {
            PatternOp::Literal(lit) => {
                let lit = lit.as_bytes();
                if url.get(pos..pos + lit.len())? != lit {
                    return None;
                }
                pos += lit.len();
            }
            PatternOp::Separator => match url.get(pos) {
                None => {}
                Some(&c) if is_boundary_char(c) => pos += 1,
                Some(_) => return None,
            },
            // Segments are split on wildcards.
            PatternOp::Wildcard => return None,
        }
    }
    Some(pos)
}

#[inline]
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
