//! Event sinks used by the CLI: human progress lines and the JSONL event log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use llmdocs_core::EventSink;
use llmdocs_shared::{PipelineEvent, RunSummary, Stage, StageStatus};

// ---------------------------------------------------------------------------
// Console progress
// ---------------------------------------------------------------------------

/// Prints `[STAGE] ...` progress lines to stdout, with a spinner while the
/// assembler streams.
pub(crate) struct ConsoleProgress {
    spinner: Mutex<Option<ProgressBar>>,
    streamed: AtomicUsize,
}

impl ConsoleProgress {
    pub(crate) fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            streamed: AtomicUsize::new(0),
        }
    }

    fn line(&self, text: String) {
        let spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match spinner.as_ref() {
            Some(bar) => bar.println(text),
            None => println!("{text}"),
        }
    }

    fn start_spinner(&self) {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message("[ASSEMBLE] waiting for first chunk");
        bar.enable_steady_tick(Duration::from_millis(80));
        self.streamed.store(0, Ordering::Relaxed);
        *self.spinner.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
    }

    fn stop_spinner(&self) {
        let bar = self.spinner.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    }

    fn recap(&self, summary: &RunSummary) {
        if let Some(v) = &summary.validation {
            self.line(format!(
                "[VALIDATE] Strict: {} passed, {} failed, {} skipped ({:.1}% pass rate)",
                v.strict.passed, v.strict.failed, v.strict.skipped, v.strict.pass_rate
            ));
            for err in &v.strict.errors {
                self.line(format!("[VALIDATE]   {} (line {}): {}", err.source, err.line, err.error));
            }
            self.line(format!(
                "[VALIDATE] Syntax: {} incorrect",
                v.syntax.incorrect.len()
            ));
            for item in &v.syntax.incorrect {
                self.line(format!("[VALIDATE]   {}: expected {}", item.construct, item.expected));
            }
            self.line(format!(
                "[VALIDATE] Patterns: {}/{} found, missing: {}",
                v.patterns.found,
                v.patterns.total,
                if v.patterns.missing.is_empty() {
                    "none".to_string()
                } else {
                    v.patterns.missing.join(", ")
                }
            ));
            for issue in &v.issues {
                self.line(format!("[VALIDATE] Issue: {issue}"));
            }
            self.line(format!("[VALIDATE] Recommendation: {}", v.recommendation));
        }
        if let Some(ratio) = summary.compression_ratio {
            self.line(format!("[RESULT] Compression ratio: {ratio:.2}x"));
        }
        if let Some(err) = &summary.error {
            self.line(format!("[ERROR] {err}"));
        }
    }
}

fn tag(stage: Stage) -> String {
    stage.as_str().to_uppercase()
}

impl EventSink for ConsoleProgress {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageTransition { stage, status } => {
                let stage = *stage;
                match status {
                    StageStatus::Running => {
                        self.line(format!("[{}] Starting...", tag(stage)));
                        if stage == Stage::Assemble {
                            self.start_spinner();
                        }
                    }
                    StageStatus::Done | StageStatus::Failed => {
                        if stage == Stage::Assemble {
                            self.stop_spinner();
                        }
                        let word = if *status == StageStatus::Done { "Complete" } else { "Failed" };
                        self.line(format!("[{}] {word}", tag(stage)));
                    }
                    StageStatus::Skipped => {
                        self.line(format!("[{}] Skipped", tag(stage)));
                    }
                    StageStatus::Pending => {}
                }
            }
            PipelineEvent::Log { stage, message } => {
                let prefix = stage.map(tag).unwrap_or_else(|| "RUN".into());
                self.line(format!("[{prefix}] {message}"));
            }
            PipelineEvent::Chunk { text } => {
                let total = self.streamed.fetch_add(text.len(), Ordering::Relaxed) + text.len();
                let spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(bar) = spinner.as_ref() {
                    bar.set_message(format!("[ASSEMBLE] {total} bytes received"));
                }
            }
            PipelineEvent::Summary { summary } => self.recap(summary),
        }
    }
}

// ---------------------------------------------------------------------------
// JSONL event log
// ---------------------------------------------------------------------------

/// Appends every event as one JSON line, for dashboards tailing the file.
pub(crate) struct JsonlLog {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlLog {
    pub(crate) fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for JsonlLog {
    fn emit(&self, event: &PipelineEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "could not serialize event");
                return;
            }
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(writer, "{line}").and_then(|()| match event {
            // Flush on stage boundaries so tailing readers see progress.
            PipelineEvent::Chunk { .. } => Ok(()),
            _ => writer.flush(),
        });
        if let Err(e) = written {
            warn!(error = %e, "could not write event log");
        }
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Delivers each event to every inner sink in order.
pub(crate) struct Fanout(pub(crate) Vec<Box<dyn EventSink>>);

impl EventSink for Fanout {
    fn emit(&self, event: &PipelineEvent) {
        for sink in &self.0 {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    impl EventSink for Counting {
        fn emit(&self, _event: &PipelineEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn event_log_writes_one_json_line_per_event() {
        let dir = std::env::temp_dir().join(format!("llmdocs-events-{}", uuid::Uuid::now_v7()));
        let path = dir.join("events.jsonl");
        let log = JsonlLog::create(&path).unwrap();

        log.emit(&PipelineEvent::StageTransition {
            stage: Stage::Fetch,
            status: StageStatus::Running,
        });
        log.emit(&PipelineEvent::Chunk { text: "a\nb".into() });
        log.emit(&PipelineEvent::Summary {
            summary: Box::new(RunSummary::new()),
        });
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "stage_transition");
        let chunk: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(chunk["text"], "a\nb");
        assert!(lines[2].contains("\"type\":\"summary\""));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let fanout = Fanout(vec![
            Box::new(Counting(count.clone())),
            Box::new(Counting(count.clone())),
        ]);
        fanout.emit(&PipelineEvent::Log {
            stage: None,
            message: "hello".into(),
        });
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }
}
