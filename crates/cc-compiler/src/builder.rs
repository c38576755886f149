use regex::RegexBuilder;

use cc_core::engine::{EngineParts, Pattern, PatternOp, PatternStart, RuleId};
use cc_core::hash::hash_token;
use cc_core::url::MIN_TOKEN_LEN;
use cc_core::{CompiledEngine, EngineError, Rule, RuleFlags, RuleTarget};

use crate::parser::{AnchorType, ParsedRule, ParsedTarget};

/// Turn parsed rules into an indexed engine. Rule ids follow input order.
pub fn build_engine(rules: &[ParsedRule]) -> Result<CompiledEngine, EngineError> {
    let mut parts = EngineParts::default();

    for parsed in rules {
        let rule = match compile_rule(parsed) {
            Some(rule) => rule,
            None => continue,
        };
        let rule_id = RuleId::try_from(parts.rules.len())
            .map_err(|_| EngineError::TooManyRules(parts.rules.len()))?;

        match &rule.target {
            RuleTarget::Host { host, .. } => {
                parts.host_index.entry(host.clone()).or_default().push(rule_id);
            }
            RuleTarget::Pattern(pattern) => match select_token(pattern) {
                Some(token) => parts.token_index.entry(token).or_default().push(rule_id),
                None => parts.untokenized.push(rule_id),
            },
            RuleTarget::Regex(_) => parts.untokenized.push(rule_id),
        }

        parts.rules.push(rule);
    }

    let engine = CompiledEngine::from_parts(parts)?;
    let stats = engine.stats();
    log::debug!(
        "built engine: {} rules, {} hosts, {} tokens, {} untokenized",
        stats.rules,
        stats.hosts,
        stats.tokens,
        stats.untokenized
    );
    Ok(engine)
}

fn compile_rule(parsed: &ParsedRule) -> Option<Rule> {
    let match_case = parsed.flags.contains(RuleFlags::MATCH_CASE);

    let target = match &parsed.target {
        ParsedTarget::Host {
            host,
            rest,
            right_anchor,
        } => RuleTarget::Host {
            host: host.as_str().into(),
            rest: rest
                .as_deref()
                .map(|text| compile_pattern(PatternStart::HostEnd, text, *right_anchor, match_case)),
        },
        ParsedTarget::Pattern {
            anchor,
            text,
            right_anchor,
        } => {
            let start = match anchor {
                AnchorType::None => PatternStart::Anywhere,
                AnchorType::Left => PatternStart::UrlStart,
                AnchorType::Hostname => PatternStart::HostLabel,
            };
            RuleTarget::Pattern(compile_pattern(start, text, *right_anchor, match_case))
        }
        ParsedTarget::Regex(source) => {
            match RegexBuilder::new(source).case_insensitive(!match_case).build() {
                Ok(re) => RuleTarget::Regex(re),
                Err(err) => {
                    log::warn!("dropping regex rule /{}/: {}", source, err);
                    return None;
                }
            }
        }
    };

    Some(Rule {
        action: parsed.action,
        flags: parsed.flags,
        type_mask: parsed.type_mask,
        party_mask: parsed.party_mask,
        scheme_mask: parsed.scheme_mask,
        domain_constraint: parsed.domain_constraint.clone(),
        target,
    })
}

// =============================================================================
// Patterns
// =============================================================================

fn compile_pattern(start: PatternStart, text: &str, end_anchor: bool, match_case: bool) -> Pattern {
    let text = if match_case {
        text.to_string()
    } else {
        text.to_ascii_lowercase()
    };

    let mut ops = Vec::new();
    let mut literal_start = None;

    for (pos, ch) in text.char_indices() {
        let op = match ch {
            '*' => PatternOp::Wildcard,
            '^' => PatternOp::Separator,
            _ => {
                literal_start.get_or_insert(pos);
                continue;
            }
        };
        if let Some(lit_start) = literal_start.take() {
            ops.push(PatternOp::Literal(text[lit_start..pos].into()));
        }
        if op == PatternOp::Wildcard && ops.last() == Some(&PatternOp::Wildcard) {
            continue;
        }
        ops.push(op);
    }
    if let Some(lit_start) = literal_start {
        ops.push(PatternOp::Literal(text[lit_start..].into()));
    }

    let mut start = start;
    let mut end_anchor = end_anchor;

    if ops.first() == Some(&PatternOp::Wildcard) && matches!(start, PatternStart::Anywhere | PatternStart::UrlStart) {
        ops.remove(0);
        start = PatternStart::Anywhere;
    }
    if ops.last() == Some(&PatternOp::Wildcard) {
        ops.pop();
        end_anchor = false;
    }

    Pattern { start, ops, end_anchor }
}

/// Pick the longest literal run that always appears as a whole URL token.
///
/// A run qualifies only when both ends are pinned to a non-alphanumeric byte
/// (or the URL boundary); otherwise the URL token containing it may be longer
/// and hash differently.
fn select_token(pattern: &Pattern) -> Option<u64> {
    let ops = &pattern.ops;
    let mut best: Option<&[u8]> = None;

    for (i, op) in ops.iter().enumerate() {
        let lit = match op {
            PatternOp::Literal(lit) => lit.as_bytes(),
            _ => continue,
        };

        let left_pinned = if i == 0 {
            matches!(pattern.start, PatternStart::UrlStart | PatternStart::HostLabel)
        } else {
            ops[i - 1] == PatternOp::Separator
        };
        let right_pinned = match ops.get(i + 1) {
            Some(next) => *next == PatternOp::Separator,
            None => pattern.end_anchor,
        };

        let mut pos = 0;
        while pos < lit.len() {
            if !lit[pos].is_ascii_alphanumeric() {
                pos += 1;
                continue;
            }
            let run_start = pos;
            while pos < lit.len() && lit[pos].is_ascii_alphanumeric() {
                pos += 1;
            }

            let safe = (run_start > 0 || left_pinned) && (pos < lit.len() || right_pinned);
            let run = &lit[run_start..pos];
            if safe && run.len() >= MIN_TOKEN_LEN && best.map_or(true, |b| run.len() > b.len()) {
                best = Some(run);
            }
        }
    }

    best.map(hash_token)
}
