//! Content Classifier Filter List Compiler
//!
//! This crate compiles adblock-style filter lists into an in-memory
//! [`CompiledEngine`]. Compilation is a pure function of the input lines:
//! lines the parser does not understand are skipped and counted, never fatal.

pub mod builder;
pub mod optimizer;
pub mod parser;

use cc_core::{CompiledEngine, EngineError};

pub use builder::build_engine;
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_line, parse_lines, ParsedLine, ParsedList, ParsedRule, SkipReason};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Every candidate line was rejected; the list is probably corrupt.
    #[error("no usable rules: all {skipped} candidate lines were skipped")]
    Empty { skipped: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Line and rule accounting for one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileReport {
    pub lines: usize,
    pub comments: usize,
    pub skipped: usize,
    /// Rules in the engine, after optimisation
    pub rules: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Compile filter list lines into an engine.
pub fn compile<I, S>(lines: I) -> Result<CompiledEngine, CompileError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    compile_with_report(lines).map(|(engine, _)| engine)
}

/// Compile filter list lines, also returning what happened to each line.
pub fn compile_with_report<I, S>(lines: I) -> Result<(CompiledEngine, CompileReport), CompileError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut list = parse_lines(lines);

    if list.rules.is_empty() && list.skipped > 0 {
        log::warn!(
            "filter list has {} candidate lines and no usable rules",
            list.skipped
        );
        return Err(CompileError::Empty { skipped: list.skipped });
    }

    let stats = optimize_rules(&mut list.rules);
    let engine = build_engine(&list.rules)?;

    let report = CompileReport {
        lines: list.lines,
        comments: list.comments,
        skipped: list.skipped,
        rules: engine.rule_count(),
        deduped: stats.deduped,
        badfilter_rules: stats.badfilter_rules,
        badfiltered_rules: stats.badfiltered_rules,
    };

    log::debug!(
        "compiled {} lines: {} rules, {} comments, {} skipped, {} duplicates, {} badfiltered",
        report.lines,
        report.rules,
        report.comments,
        report.skipped,
        report.deduped,
        report.badfiltered_rules
    );

    Ok((engine, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::{evaluate, ClassificationRequest, ResourceType};

    fn third_party(url: &str, site: &str) -> ClassificationRequest {
        ClassificationRequest::new(url, site, "news.example", ResourceType::Script, true)
    }

    #[test]
    fn exception_suppresses_block() {
        let engine = compile(["||tracker.example^", "@@||tracker.example/allowed^"]).expect("compiles");
        let result = evaluate(
            Some(&engine),
            &third_party("https://tracker.example/allowed^script", "tracker.example"),
        );
        assert!(result.matched());
        assert!(result.is_exception());
        assert!(!result.hit());

        let other_path = evaluate(
            Some(&engine),
            &third_party("https://tracker.example/pixel.gif", "tracker.example"),
        );
        assert!(other_path.hit());
    }

    #[test]
    fn important_beats_exception_in_either_order() {
        for lines in [
            ["||tracker.example^$important", "@@||tracker.example^"],
            ["@@||tracker.example^", "||tracker.example^$important"],
        ] {
            let engine = compile(lines).expect("compiles");
            let result = evaluate(
                Some(&engine),
                &third_party("https://tracker.example/allowed^script", "tracker.example"),
            );
            assert!(result.important());
            assert!(result.hit());
        }
    }

    #[test]
    fn garbage_lines_do_not_fail_compilation() {
        let (engine, report) = compile_with_report([
            "! comment",
            "||tracker.example^",
            "this is garbage",
            "||x.example^$totally-unknown-option",
        ])
        .expect("compiles");
        assert_eq!(engine.rule_count(), 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.comments, 1);
        assert_eq!(report.lines, 4);
    }

    #[test]
    fn all_garbage_is_empty_error() {
        let err = compile(["this is garbage", "example.com##.ad"]).unwrap_err();
        assert!(matches!(err, CompileError::Empty { skipped: 2 }));
    }

    #[test]
    fn empty_and_comment_only_input_compile() {
        let engine = compile(Vec::<String>::new()).expect("empty input compiles");
        assert!(engine.is_empty());
        let result = evaluate(Some(&engine), &third_party("https://tracker.example/", "tracker.example"));
        assert!(!result.hit());
        assert!(result.outcome().is_success());

        let engine = compile(["! only a header", ""]).expect("comment-only input compiles");
        assert!(engine.is_empty());
    }

    #[test]
    fn residual_patterns_match_through_token_index() {
        let engine = compile(["/track.gif", "banner", "/ads[0-9]+\\.js/"]).expect("compiles");
        let req = |url: &str| evaluate(Some(&engine), &third_party(url, "cdn.example"));
        assert!(req("https://cdn.example/img/track.gif?x=1").hit());
        assert!(req("https://cdn.example/top-banner.png").hit());
        assert!(req("https://cdn.example/ads42.js").hit());
        assert!(!req("https://cdn.example/tracking.gif").hit());
    }

    #[test]
    fn first_party_requests_are_never_classified() {
        let engine = compile(["||tracker.example^$important"]).expect("compiles");
        let req = ClassificationRequest::new(
            "https://tracker.example/t.js",
            "tracker.example",
            "tracker.example",
            ResourceType::Script,
            false,
        );
        let result = evaluate(Some(&engine), &req);
        assert!(result.outcome().is_success());
        assert!(!result.matched());
    }

    #[test]
    fn wildcard_heavy_rules_do_not_stall() {
        let engine = compile(["a*a*a*z", "a*a*a*a*z", "^a*a*a*^z|", "/x*a*a*a*y^"]).expect("compiles");
        let url = format!("https://cdn.example/x{}", "a".repeat(2000));

        let start = std::time::Instant::now();
        let result = evaluate(Some(&engine), &third_party(&url, "cdn.example"));
        assert!(start.elapsed() < std::time::Duration::from_secs(1), "took {:?}", start.elapsed());
        assert!(result.outcome().is_success());
        assert!(!result.matched());

        let result = evaluate(Some(&engine), &third_party(&format!("{url}z"), "cdn.example"));
        assert!(result.hit());
    }

    #[test]
    fn domain_option_covers_source_and_its_subdomains() {
        let engine = compile([
            "||tracker.example^$domain=shop.news.example",
            "||other.example^$domain=~shop.news.example",
        ])
        .expect("compiles");
        let from = |url: &str, site: &str, source: &str| {
            evaluate(
                Some(&engine),
                &ClassificationRequest::new(url, site, source, ResourceType::Script, true),
            )
        };

        assert!(!from("https://tracker.example/", "tracker.example", "news.example").matched());
        assert!(from("https://tracker.example/", "tracker.example", "m.shop.news.example").hit());
        assert!(from("https://other.example/", "other.example", "news.example").hit());
        assert!(!from("https://other.example/", "other.example", "shop.news.example").matched());
    }

    #[test]
    fn bare_host_anchor_is_a_label_prefix() {
        let engine = compile(["||tracker.example"]).expect("compiles");
        let req = |url: &str, site: &str| evaluate(Some(&engine), &third_party(url, site));
        assert!(req("https://tracker.example/t.js", "tracker.example").hit());
        assert!(req("https://cdn.tracker.example/t.js", "tracker.example").hit());
        assert!(req("https://tracker.example.evil.com/t.js", "evil.com").hit());
        assert!(!req("https://nottracker.example/t.js", "nottracker.example").hit());

        let engine = compile(["||tracker.example^"]).expect("compiles");
        let result = evaluate(
            Some(&engine),
            &third_party("https://tracker.example.evil.com/t.js", "evil.com"),
        );
        assert!(!result.matched());
    }

    #[test]
    fn badfilter_disables_rule() {
        let (engine, report) =
            compile_with_report(["||tracker.example^", "||tracker.example^$badfilter"]).expect("compiles");
        assert!(engine.is_empty());
        assert_eq!(report.badfiltered_rules, 1);
    }
}
