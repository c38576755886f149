use std::collections::HashSet;

use cc_core::types::RuleFlags;

use crate::parser::ParsedRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Apply `$badfilter` and drop exact duplicates, keeping first occurrences.
pub fn optimize_rules(rules: &mut Vec<ParsedRule>) -> OptimizeStats {
    let before = rules.len();
    let mut badfilter_keys: HashSet<ParsedRule> = HashSet::new();
    let mut badfilter_rules = 0usize;

    for rule in rules.iter() {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            badfilter_rules += 1;
            badfilter_keys.insert(badfilter_target(rule));
        }
    }

    let mut badfiltered_rules = 0usize;
    rules.retain(|rule| {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            return false;
        }
        if badfilter_keys.contains(rule) {
            badfiltered_rules += 1;
            return false;
        }
        true
    });

    let mut seen: HashSet<ParsedRule> = HashSet::with_capacity(rules.len());
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(rule.clone()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        deduped,
        badfilter_rules,
        badfiltered_rules,
    }
}

/// The rule a `$badfilter` rule disables: itself without the flag.
fn badfilter_target(rule: &ParsedRule) -> ParsedRule {
    let mut target = rule.clone();
    target.flags.remove(RuleFlags::BADFILTER);
    target
}
