//! Check outcomes.

use std::fmt;

/// Outcome of one regression check.
///
/// Mirrors the four signals a test runner understands: pass, hard failure,
/// soft failure (a reviewable non-pass after a rebase) and abort (a new
/// baseline was written and must be reviewed before the check means anything).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Obtained output matches the baseline.
    Pass,
    /// Obtained output differs from the baseline; carries the diff report.
    HardFail(String),
    /// Obtained output differed and the baseline was overwritten.
    SoftFail(String),
    /// No baseline existed; one was created.
    Abort(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_hard_fail(&self) -> bool {
        matches!(self, Verdict::HardFail(_))
    }

    pub fn is_soft_fail(&self) -> bool {
        matches!(self, Verdict::SoftFail(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Verdict::Abort(_))
    }

    /// Message attached to a non-pass verdict.
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::HardFail(m) | Verdict::SoftFail(m) | Verdict::Abort(m) => Some(m),
        }
    }

    /// Panic unless the check passed.
    ///
    /// Intended for direct use in `#[test]` functions. Each non-pass signal
    /// gets its own prefix so a created or rebased baseline is never mistaken
    /// for a regression.
    #[track_caller]
    pub fn assert_pass(&self) {
        if !self.is_pass() {
            panic!("{self}");
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::HardFail(m) => write!(f, "FAILED: {m}"),
            Verdict::SoftFail(m) => write!(f, "XFAIL (rebased): {m}"),
            Verdict::Abort(m) => write!(f, "ABORTED (baseline created): {m}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_has_no_message() {
        assert!(Verdict::Pass.is_pass());
        assert_eq!(Verdict::Pass.message(), None);
        Verdict::Pass.assert_pass();
    }

    #[test]
    #[should_panic(expected = "ABORTED")]
    fn abort_is_not_a_pass() {
        Verdict::Abort("created".to_string()).assert_pass();
    }

    #[test]
    #[should_panic(expected = "XFAIL")]
    fn soft_fail_is_not_a_pass() {
        Verdict::SoftFail("rebased".to_string()).assert_pass();
    }
}
