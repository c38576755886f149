//! Classification results and the cross-engine fold.

use std::fmt;

/// How an evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Rules were evaluated
    Success,
    /// No engine (or service) was ready to evaluate
    NotInitialized,
    /// The request was marked invalid at construction
    InvalidArgument,
    /// The compiled structure was inconsistent
    InternalError,
}

impl Outcome {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::NotInitialized => "not-initialized",
            Self::InvalidArgument => "invalid-argument",
            Self::InternalError => "internal-error",
        };
        f.write_str(s)
    }
}

/// What the rules decided.
///
/// `Matched` means a blocking rule matched. `exception` records that an
/// exception rule suppressed it; `important` that an `$important` rule
/// decided and no exception applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verdict {
    #[default]
    NoMatch,
    Matched { exception: bool, important: bool },
}

/// Result of evaluating one request against one or more engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassificationResult {
    outcome: Outcome,
    verdict: Verdict,
}

impl ClassificationResult {
    pub const fn new(outcome: Outcome, verdict: Verdict) -> Self {
        Self { outcome, verdict }
    }

    /// Successful evaluation with the given verdict.
    pub const fn success(verdict: Verdict) -> Self {
        Self::new(Outcome::Success, verdict)
    }

    /// Failed evaluation; carries no verdict.
    pub const fn failure(outcome: Outcome) -> Self {
        Self::new(outcome, Verdict::NoMatch)
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// A blocking rule matched (possibly suppressed by an exception).
    pub fn matched(&self) -> bool {
        matches!(self.verdict, Verdict::Matched { .. })
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.verdict, Verdict::Matched { exception: true, .. })
    }

    pub fn is_important(&self) -> bool {
        matches!(self.verdict, Verdict::Matched { important: true, .. })
    }

    /// The request should be blocked or annotated.
    pub fn hit(&self) -> bool {
        self.outcome.is_success() && self.matched() && !self.is_exception()
    }

    pub fn exception(&self) -> bool {
        self.outcome.is_success() && self.is_exception()
    }

    pub fn important(&self) -> bool {
        self.outcome.is_success() && self.is_important()
    }

    /// Fold another engine's result into this one.
    ///
    /// Failed results contribute nothing. Once this result is important it
    /// is locked. Otherwise the latest matching result replaces the verdict.
    #[must_use]
    pub fn accumulate(self, other: ClassificationResult) -> ClassificationResult {
        if !other.outcome.is_success() || self.is_important() {
            return self;
        }

        match other.verdict {
            Verdict::Matched { .. } => Self {
                outcome: self.outcome,
                verdict: other.verdict,
            },
            Verdict::NoMatch => self,
        }
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::success(Verdict::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: ClassificationResult = ClassificationResult::success(Verdict::Matched {
        exception: false,
        important: false,
    });
    const EXCEPTED: ClassificationResult = ClassificationResult::success(Verdict::Matched {
        exception: true,
        important: false,
    });
    const IMPORTANT: ClassificationResult = ClassificationResult::success(Verdict::Matched {
        exception: false,
        important: true,
    });
    const NONE: ClassificationResult = ClassificationResult::success(Verdict::NoMatch);

    fn all_results() -> Vec<ClassificationResult> {
        let mut v = vec![BLOCK, EXCEPTED, IMPORTANT, NONE];
        for outcome in [Outcome::NotInitialized, Outcome::InvalidArgument, Outcome::InternalError] {
            v.push(ClassificationResult::failure(outcome));
            v.push(ClassificationResult::new(outcome, BLOCK.verdict()));
        }
        v
    }

    #[test]
    fn test_accessors() {
        assert!(BLOCK.hit() && !BLOCK.exception() && !BLOCK.important());
        assert!(!EXCEPTED.hit() && EXCEPTED.exception() && EXCEPTED.matched());
        assert!(IMPORTANT.hit() && IMPORTANT.important());
        assert!(!NONE.hit() && !NONE.matched());
    }

    #[test]
    fn test_failed_results_never_hit() {
        let failed = ClassificationResult::new(Outcome::InternalError, BLOCK.verdict());
        assert!(failed.matched());
        assert!(!failed.hit());
        assert!(!failed.important());
    }

    #[test]
    fn test_accumulate_ignores_failures() {
        for current in all_results() {
            for outcome in [Outcome::NotInitialized, Outcome::InvalidArgument, Outcome::InternalError] {
                let failed = ClassificationResult::new(outcome, IMPORTANT.verdict());
                assert_eq!(current.accumulate(failed), current);
            }
        }
    }

    #[test]
    fn test_accumulate_important_is_sticky() {
        for other in all_results() {
            let folded = IMPORTANT.accumulate(other);
            assert_eq!(folded, IMPORTANT);
        }
    }

    #[test]
    fn test_accumulate_last_match_wins() {
        assert_eq!(BLOCK.accumulate(EXCEPTED), EXCEPTED);
        assert_eq!(EXCEPTED.accumulate(BLOCK), BLOCK);
        assert_eq!(BLOCK.accumulate(NONE), BLOCK);
        assert_eq!(NONE.accumulate(BLOCK), BLOCK);
    }

    #[test]
    fn test_accumulate_keeps_current_outcome() {
        let folded = NONE.accumulate(IMPORTANT);
        assert_eq!(folded.outcome(), Outcome::Success);
        assert!(folded.important());
    }
}
