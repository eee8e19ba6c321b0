//! External code checker abstraction.

use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use llmdocs_shared::{LlmDocsError, Result, ValidateConfig};

/// Outcome of checking one piece of code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub ok: bool,
    /// Checker message for a failure.
    pub diagnostics: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            ok: true,
            diagnostics: None,
        }
    }

    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostics: Some(diagnostics.into()),
        }
    }
}

/// Compiles or type-checks a code snippet.
///
/// `Err` means the checker itself could not run and no verdict exists;
/// a snippet that fails its check is `Ok` with `ok == false`.
pub trait CodeChecker: Send + Sync {
    fn check(&self, code: &str) -> Result<CheckOutcome>;
}

/// Runs the configured command on a temporary file holding the snippet.
#[derive(Debug, Clone)]
pub struct SubprocessChecker {
    command: String,
    args: Vec<String>,
    extension: String,
}

impl SubprocessChecker {
    pub fn new(command: impl Into<String>, args: Vec<String>, extension: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args,
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &ValidateConfig) -> Self {
        Self::new(
            config.checker_command.clone(),
            config.checker_args.clone(),
            config.file_extension.clone(),
        )
    }
}

impl CodeChecker for SubprocessChecker {
    fn check(&self, code: &str) -> Result<CheckOutcome> {
        let path = std::env::temp_dir().join(format!(
            "llmdocs-check-{}.{}",
            uuid::Uuid::now_v7(),
            self.extension
        ));
        std::fs::write(&path, code).map_err(|e| LlmDocsError::io(&path, e))?;

        let output = Command::new(&self.command).args(&self.args).arg(&path).output();
        let _ = std::fs::remove_file(&path);

        let output = output.map_err(|e| {
            LlmDocsError::ValidatorUnavailable(format!("cannot run `{}`: {e}", self.command))
        })?;

        let Some(code) = output.status.code() else {
            return Err(LlmDocsError::ValidatorUnavailable(format!(
                "`{}` terminated abnormally ({})",
                self.command, output.status
            )));
        };

        trace!(exit = code, "checker finished");
        if code == 0 {
            return Ok(CheckOutcome::pass());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = summarize_diagnostics(&format!("{stderr}\n{stdout}"))
            .unwrap_or_else(|| format!("`{}` exited with status {code}", self.command));

        debug!(%message, "check failed");
        Ok(CheckOutcome::fail(message))
    }
}

/// First error-looking line of checker output, prefixed with its line number
/// when one can be parsed.
fn summarize_diagnostics(output: &str) -> Option<String> {
    static ERROR_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\berror\b").expect("valid regex"));
    static LINE_NO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(?:\bline\s+(\d+)|:(\d+):\d+)").expect("valid regex")
    });

    let lines: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let line = lines
        .iter()
        .find(|l| ERROR_LINE_RE.is_match(l))
        .or_else(|| lines.first())?;

    let line_no = LINE_NO_RE
        .captures(line)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str());

    Some(match line_no {
        Some(n) if !line.to_lowercase().contains("line") => format!("line {n}: {line}"),
        _ => line.to_string(),
    })
}
