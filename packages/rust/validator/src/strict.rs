//! Strict check: every eligible code block goes through the [`CodeChecker`].

use tracing::{debug, instrument};

use llmdocs_shared::{MAX_STRICT_ERRORS, Result, StrictError, StrictResult};

use crate::blocks::{BlockClass, CheckBlock, classify, prepare_for_check};
use crate::checker::{CheckOutcome, CodeChecker};

/// Snippet length reported for a failing block.
const SNIPPET_CHARS: usize = 200;

/// Check `blocks` in order, keeping at most `max_errors` failures (never more
/// than [`MAX_STRICT_ERRORS`]).
///
/// A checker error aborts the whole pass: a partial tally cannot be trusted.
#[instrument(skip_all, fields(blocks = blocks.len()))]
pub(crate) fn strict_check(
    blocks: &[CheckBlock],
    checker: &dyn CodeChecker,
    max_errors: usize,
) -> Result<StrictResult> {
    let max_errors = max_errors.min(MAX_STRICT_ERRORS);
    let mut result = StrictResult {
        total: blocks.len(),
        ..StrictResult::default()
    };

    for block in blocks {
        if block.wrong {
            debug!(block = block.number, "intentionally invalid example skipped");
            result.skipped += 1;
            continue;
        }

        let class = classify(&block.code);
        if !class.is_checkable() {
            debug!(block = block.number, ?class, "block skipped");
            result.skipped += 1;
            continue;
        }

        let outcome = check_block(&block.code, class, checker)?;
        if outcome.ok {
            result.passed += 1;
            continue;
        }

        result.failed += 1;
        if result.errors.len() < max_errors {
            result.errors.push(StrictError {
                source: format!("block {}", block.number),
                line: block.line,
                error: outcome.diagnostics.unwrap_or_else(|| "check failed".into()),
                code: snippet(&block.code),
            });
        }
    }

    let checked = result.passed + result.failed;
    result.pass_rate = if checked == 0 {
        100.0
    } else {
        result.passed as f64 / checked as f64 * 100.0
    };

    Ok(result)
}

/// Statement blocks are always wrapped; anything else is checked as written
/// and retried wrapped on failure.
fn check_block(code: &str, class: BlockClass, checker: &dyn CodeChecker) -> Result<CheckOutcome> {
    if class == BlockClass::Statements {
        return checker.check(&prepare_for_check(code));
    }

    let outcome = checker.check(code)?;
    if outcome.ok {
        return Ok(outcome);
    }
    checker.check(&prepare_for_check(code))
}

fn snippet(code: &str) -> String {
    let flat = code.replace('\n', " ");
    if flat.chars().count() > SNIPPET_CHARS {
        let mut cut: String = flat.chars().take(SNIPPET_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmdocs_shared::LlmDocsError;
    use std::sync::Mutex;

    /// Fails any code containing `FAIL` and records every snippet it sees.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl CodeChecker for Recording {
        fn check(&self, code: &str) -> Result<CheckOutcome> {
            self.seen.lock().unwrap().push(code.to_string());
            if code.contains("FAIL") {
                Ok(CheckOutcome::fail("line 1: bad"))
            } else {
                Ok(CheckOutcome::pass())
            }
        }
    }

    struct Broken;

    impl CodeChecker for Broken {
        fn check(&self, _code: &str) -> Result<CheckOutcome> {
            Err(LlmDocsError::ValidatorUnavailable("crashed".into()))
        }
    }

    fn block(number: usize, code: &str, wrong: bool) -> CheckBlock {
        CheckBlock {
            number,
            line: number * 10,
            code: code.into(),
            wrong,
        }
    }

    #[test]
    fn counts_and_error_cap() {
        let mut blocks: Vec<_> = (1..=12)
            .map(|i| block(i, &format!("node N{i} {{ has FAIL: int; }}"), false))
            .collect();
        blocks.push(block(13, "node Ok { has x: int; }", false));
        blocks.push(block(14, "node Bad { has FAIL: int; }", true));
        blocks.push(block(15, "print(1);", false));

        let result = strict_check(&blocks, &Recording::default(), 10).unwrap();
        assert_eq!(result.total, 15);
        assert_eq!(result.failed, 12);
        assert_eq!(result.passed, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.errors.len(), 10);
        assert_eq!(result.errors[0].source, "block 1");
        assert_eq!(result.errors[0].line, 10);
        assert_eq!(result.errors[9].source, "block 10");
        assert!((result.pass_rate - 100.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn error_cap_never_exceeds_ten() {
        let blocks: Vec<_> = (1..=15)
            .map(|i| block(i, &format!("node N{i} {{ has FAIL: int; }}"), false))
            .collect();
        let result = strict_check(&blocks, &Recording::default(), 50).unwrap();
        assert_eq!(result.failed, 15);
        assert_eq!(result.errors.len(), 10);

        let result = strict_check(&blocks, &Recording::default(), 3).unwrap();
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn statements_are_wrapped_before_checking() {
        let checker = Recording::default();
        let blocks = vec![block(1, "x = 5;\nprint(x);", false)];
        let result = strict_check(&blocks, &checker, 10).unwrap();
        assert_eq!(result.passed, 1);
        let seen = checker.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("with entry {"));
    }

    #[test]
    fn complete_blocks_retried_wrapped() {
        let checker = Recording::default();
        let blocks = vec![block(1, "node A { has x: int; }\nFAIL = 1;", false)];
        strict_check(&blocks, &checker, 10).unwrap();
        assert_eq!(checker.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn nothing_checked_is_full_pass_rate() {
        let blocks = vec![block(1, "node A { has x = 1; }", true)];
        let result = strict_check(&blocks, &Recording::default(), 10).unwrap();
        assert_eq!(result.pass_rate, 100.0);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn checker_failure_propagates() {
        let blocks = vec![block(1, "node A { has x: int; }", false)];
        let err = strict_check(&blocks, &Broken, 10).unwrap_err();
        assert!(matches!(err, LlmDocsError::ValidatorUnavailable(_)));
    }

    #[test]
    fn snippet_is_single_line_and_capped() {
        assert_eq!(snippet("a\nb"), "a b");
        let long = "x".repeat(250);
        let s = snippet(&long);
        assert_eq!(s.len(), 203);
        assert!(s.ends_with("..."));
    }
}
