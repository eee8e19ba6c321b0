//! End-to-end run: fetch → extract → assemble → validate.
//!
//! Stages run strictly in sequence. Each one moves from pending to running to
//! done or failed, or starts out skipped when a previous artifact is reused.
//! The first failure halts the run and leaves later stages pending. Every
//! transition is emitted as a [`PipelineEvent`], and the run always ends with
//! a [`RunSummary`], even when a stage failed.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use llmdocs_extractor::{extract, format_for_prompt, load_records, save_records};
use llmdocs_fetcher::{FetchOptions, fetch_language_version, fetch_sources, load_cached};
use llmdocs_shared::{
    AppConfig, Candidate, Document, LlmDocsError, PipelineEvent, Result, RunSummary, Stage,
    StageReport, StageStatus, ValidationResult, api_key,
};
use llmdocs_validator::{CodeChecker, SubprocessChecker};

use crate::artifacts;
use crate::assembler::{self, LlmClient, OpenRouterClient};
use crate::release;

// ---------------------------------------------------------------------------
// Context and options
// ---------------------------------------------------------------------------

/// Everything a run needs, built once and passed to every stage.
pub struct RunContext {
    pub config: AppConfig,
    /// `None` when no API credential is available.
    pub llm: Option<Arc<dyn LlmClient>>,
    pub checker: Arc<dyn CodeChecker>,
}

impl RunContext {
    /// Build the context from a loaded config.
    ///
    /// A missing API key is not an error here; it only fails runs that
    /// actually assemble.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let llm: Option<Arc<dyn LlmClient>> = match api_key(&config.assembly) {
            Ok(key) => Some(Arc::new(OpenRouterClient::new(&config.assembly, key)?)),
            Err(e) => {
                debug!(error = %e, "no LLM credential");
                None
            }
        };
        let checker = Arc::new(SubprocessChecker::from_config(&config.validate));

        Ok(Self {
            config,
            llm,
            checker,
        })
    }

    fn llm(&self) -> Result<&dyn LlmClient> {
        self.llm.as_deref().ok_or_else(|| {
            LlmDocsError::precondition(format!(
                "LLM API key not found. Set the {} environment variable.",
                self.config.assembly.api_key_env
            ))
        })
    }
}

/// Which previously persisted artifacts to reuse.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Reload documents from the fetch cache.
    pub skip_fetch: bool,
    /// Reload records from the records file.
    pub skip_extract: bool,
    /// Validate the existing candidate and nothing else.
    pub validate_only: bool,
}

/// Receiver for pipeline events (progress lines, dashboards, event logs).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Discards every event.
pub struct SilentSink;

impl EventSink for SilentSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Execute a run and return its summary.
///
/// Never fails: a fatal stage error is recorded in the summary's `error`
/// field and the summary is still emitted.
#[instrument(skip_all, fields(validate_only = opts.validate_only, skip_fetch = opts.skip_fetch, skip_extract = opts.skip_extract))]
pub async fn run(ctx: &RunContext, opts: &RunOptions, sink: &dyn EventSink) -> RunSummary {
    let mut tracker = Tracker {
        sink,
        summary: RunSummary::new(),
    };
    info!(run_id = %tracker.summary.run_id, "starting run");

    let outcome = if opts.validate_only {
        validate_existing(ctx, &mut tracker).await
    } else {
        full_run(ctx, opts, &mut tracker).await
    };

    let mut summary = tracker.summary;
    match outcome {
        Ok(()) => {
            summary.success = summary
                .validation
                .as_ref()
                .is_some_and(|v| v.recommendation.is_pass());
        }
        Err(e) => {
            warn!(error = %e, "run failed");
            summary.success = false;
            summary.error = Some(e.to_string());
        }
    }

    info!(success = summary.success, exit_code = summary.exit_code(), "run finished");
    sink.emit(&PipelineEvent::Summary {
        summary: Box::new(summary.clone()),
    });
    summary
}

async fn full_run(ctx: &RunContext, opts: &RunOptions, t: &mut Tracker<'_>) -> Result<()> {
    let paths = &ctx.config.paths;
    let llm = ctx.llm()?;

    // --- Fetch ---
    let docs = if opts.skip_fetch {
        let start = Instant::now();
        t.settle(Stage::Fetch, start, StageStatus::Skipped, load_cached_stage(ctx))?
    } else {
        let start = t.begin(Stage::Fetch);
        let result = fetch_stage(ctx, t.sink).await;
        t.settle(Stage::Fetch, start, StageStatus::Done, result)?
    };
    let sanitized_bytes: usize = docs.iter().map(|d| d.size_bytes).sum();

    // --- Extract ---
    let content = if opts.skip_extract {
        let start = Instant::now();
        t.settle(Stage::Extract, start, StageStatus::Skipped, load_records_stage(ctx))?
    } else {
        let start = t.begin(Stage::Extract);
        let result = extract_stage(ctx, &docs, t.sink);
        t.settle(Stage::Extract, start, StageStatus::Done, result)?
    };

    // --- Assemble ---
    t.summary.language_version = check_version(ctx, t.sink).await;
    let start = t.begin(Stage::Assemble);
    let result = assemble_stage(ctx, llm, &content, t.sink).await;
    let candidate = t.settle(Stage::Assemble, start, StageStatus::Done, result)?;
    t.summary.output_path = Some(paths.candidate_file.display().to_string());
    if candidate.size_bytes > 0 && sanitized_bytes > 0 {
        let ratio = sanitized_bytes as f64 / candidate.size_bytes as f64;
        t.summary.compression_ratio = Some((ratio * 100.0).round() / 100.0);
    }

    // --- Validate ---
    let start = t.begin(Stage::Validate);
    let result = validate_stage(ctx, candidate.text).await;
    let validation = t.settle(Stage::Validate, start, StageStatus::Done, result)?;
    t.summary.validation = Some(validation);

    Ok(())
}

async fn validate_existing(ctx: &RunContext, t: &mut Tracker<'_>) -> Result<()> {
    for stage in [Stage::Fetch, Stage::Extract, Stage::Assemble] {
        t.set_status(stage, StageStatus::Skipped);
    }

    let path = &ctx.config.paths.candidate_file;
    let start = t.begin(Stage::Validate);
    let text = match artifacts::read_candidate(path) {
        Ok(text) => text,
        Err(e) => return t.settle(Stage::Validate, start, StageStatus::Done, Err(e)),
    };
    t.log(
        Stage::Validate,
        format!("Loaded {} bytes from {}", text.len(), path.display()),
    );
    t.summary.output_path = Some(path.display().to_string());

    let result = validate_stage(ctx, text).await;
    let validation = t.settle(Stage::Validate, start, StageStatus::Done, result)?;
    t.summary.validation = Some(validation);
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage bookkeeping
// ---------------------------------------------------------------------------

struct Tracker<'a> {
    sink: &'a dyn EventSink,
    summary: RunSummary,
}

impl Tracker<'_> {
    fn set_status(&mut self, stage: Stage, status: StageStatus) {
        self.summary.stages.get_mut(stage).status = status;
        self.sink
            .emit(&PipelineEvent::StageTransition { stage, status });
    }

    fn begin(&mut self, stage: Stage) -> Instant {
        info!(%stage, "stage started");
        self.set_status(stage, StageStatus::Running);
        Instant::now()
    }

    fn log(&self, stage: Stage, message: String) {
        self.sink.emit(&PipelineEvent::Log {
            stage: Some(stage),
            message,
        });
    }

    /// Record the outcome of `stage`, moving it to `ok_status` or `Failed`.
    fn settle<T>(
        &mut self,
        stage: Stage,
        start: Instant,
        ok_status: StageStatus,
        result: Result<(T, StageReport)>,
    ) -> Result<T> {
        let duration_secs = Some((start.elapsed().as_secs_f64() * 1000.0).round() / 1000.0);
        match result {
            Ok((value, report)) => {
                *self.summary.stages.get_mut(stage) = StageReport {
                    duration_secs,
                    ..report
                };
                info!(%stage, status = ?ok_status, "stage finished");
                self.set_status(stage, ok_status);
                Ok(value)
            }
            Err(e) => {
                self.summary.stages.get_mut(stage).duration_secs = duration_secs;
                self.log(stage, format!("Failed: {e}"));
                self.set_status(stage, StageStatus::Failed);
                Err(e)
            }
        }
    }
}

fn counter(report: &mut StageReport, name: &str, value: usize) {
    report.counters.insert(name.to_string(), value as u64);
}

fn log_event(sink: &dyn EventSink, stage: Stage, message: String) {
    sink.emit(&PipelineEvent::Log {
        stage: Some(stage),
        message,
    });
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

async fn fetch_stage(
    ctx: &RunContext,
    sink: &dyn EventSink,
) -> Result<(Vec<Document>, StageReport)> {
    let sources = &ctx.config.sources;
    if sources.is_empty() {
        return Err(LlmDocsError::config("no sources configured"));
    }

    let opts = FetchOptions {
        sanitize: ctx.config.sanitize.clone(),
        cache_dir: Some(ctx.config.paths.cache_dir.clone()),
        ..FetchOptions::default()
    };

    let total = sources.len();
    let mut current = 0usize;
    let outcome = fetch_sources(sources, &opts, |doc| {
        current += 1;
        log_event(
            sink,
            Stage::Fetch,
            format!(
                "Source {current}/{total}: {} ({} -> {} bytes)",
                doc.name, doc.raw_size_bytes, doc.size_bytes
            ),
        );
    })
    .await?;

    for (name, reason) in &outcome.skipped {
        log_event(sink, Stage::Fetch, format!("Skipped optional source {name}: {reason}"));
    }
    if outcome.documents.is_empty() {
        return Err(LlmDocsError::Fetch("no documents fetched".into()));
    }

    let mut report = StageReport {
        input_bytes: Some(outcome.raw_bytes()),
        output_bytes: Some(outcome.sanitized_bytes()),
        ..StageReport::default()
    };
    counter(&mut report, "documents", outcome.documents.len());
    counter(&mut report, "skipped_sources", outcome.skipped.len());

    log_event(
        sink,
        Stage::Fetch,
        format!(
            "Complete: {} documents kept, {} skipped",
            outcome.documents.len(),
            outcome.skipped.len()
        ),
    );
    Ok((outcome.documents, report))
}

fn load_cached_stage(ctx: &RunContext) -> Result<(Vec<Document>, StageReport)> {
    let docs = load_cached(&ctx.config.paths.cache_dir)?;
    let mut report = StageReport {
        output_bytes: Some(docs.iter().map(|d| d.size_bytes).sum()),
        ..StageReport::default()
    };
    counter(&mut report, "documents", docs.len());
    Ok((docs, report))
}

/// Extract records, persist them, and render the prompt body.
fn extract_stage(
    ctx: &RunContext,
    docs: &[Document],
    sink: &dyn EventSink,
) -> Result<(String, StageReport)> {
    let set = extract(docs, &ctx.config.extract);
    save_records(&ctx.config.paths.records_file, &set)?;

    if set.records.is_empty() {
        warn!("no signatures extracted, the prompt will carry keywords only");
    }
    for name in &set.skipped_documents {
        log_event(sink, Stage::Extract, format!("Skipped malformed document {name}"));
    }

    let content = format_for_prompt(&set);
    let mut report = StageReport {
        input_bytes: Some(docs.iter().map(|d| d.size_bytes).sum()),
        output_bytes: Some(content.len()),
        ..StageReport::default()
    };
    counter(&mut report, "documents", set.documents);
    counter(&mut report, "records", set.records.len());
    counter(&mut report, "examples", set.example_count());
    counter(&mut report, "keywords", set.keywords.len());
    counter(&mut report, "skipped_documents", set.skipped_documents.len());

    log_event(
        sink,
        Stage::Extract,
        format!(
            "Signatures: {}, Examples: {}, Keywords: {}",
            set.records.len(),
            set.example_count(),
            set.keywords.len()
        ),
    );
    Ok((content, report))
}

fn load_records_stage(ctx: &RunContext) -> Result<(String, StageReport)> {
    let set = load_records(&ctx.config.paths.records_file)?;
    let content = format_for_prompt(&set);
    let mut report = StageReport {
        output_bytes: Some(content.len()),
        ..StageReport::default()
    };
    counter(&mut report, "records", set.records.len());
    Ok((content, report))
}

/// Best-effort upstream version lookup and release archiving.
async fn check_version(ctx: &RunContext, sink: &dyn EventSink) -> Option<String> {
    let release_dir = &ctx.config.paths.release_dir;
    let recorded = release::read_version(release_dir).unwrap_or_else(|e| {
        warn!(error = %e, "could not read recorded version");
        None
    });

    let Some(url) = &ctx.config.version.url else {
        return recorded;
    };
    let upstream = match fetch_language_version(url, 10).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "version lookup failed, skipping release check");
            return recorded;
        }
    };

    log_event(
        sink,
        Stage::Assemble,
        format!(
            "Version: current {}, upstream {upstream}",
            recorded.as_deref().unwrap_or("<none>")
        ),
    );

    let paths = &ctx.config.paths;
    let files = [paths.candidate_file.as_path(), paths.validation_file.as_path()];
    match release::record_version(release_dir, &upstream, &files) {
        Ok(Some(dir)) => {
            log_event(sink, Stage::Assemble, format!("Archived {}", dir.display()));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "release archiving failed"),
    }
    Some(upstream)
}

#[instrument(skip_all, fields(content_bytes = content.len()))]
async fn assemble_stage(
    ctx: &RunContext,
    llm: &dyn LlmClient,
    content: &str,
    sink: &dyn EventSink,
) -> Result<(Candidate, StageReport)> {
    let paths = &ctx.config.paths;
    let template = assembler::load_template(&ctx.config.assembly)?;
    let prompt = assembler::build_prompt(&template, content);

    // The old result would describe a candidate that is about to change.
    artifacts::remove_stale_validation(&paths.validation_file)?;

    log_event(
        sink,
        Stage::Assemble,
        format!(
            "Sending {} byte prompt to {}",
            prompt.len(),
            ctx.config.assembly.model
        ),
    );
    let candidate = assembler::assemble(llm, &prompt, |text: &str| {
        sink.emit(&PipelineEvent::Chunk {
            text: text.to_string(),
        });
    })
    .await?;

    artifacts::write_candidate(&paths.candidate_file, &candidate.text)?;

    let mut report = StageReport {
        input_bytes: Some(prompt.len()),
        output_bytes: Some(candidate.size_bytes),
        ..StageReport::default()
    };
    counter(&mut report, "chunks", candidate.chunks);

    log_event(
        sink,
        Stage::Assemble,
        format!(
            "Output: {} bytes saved to {}",
            candidate.size_bytes,
            paths.candidate_file.display()
        ),
    );
    Ok((candidate, report))
}

/// Validate `text` off the async runtime and persist the result next to
/// the candidate.
async fn validate_stage(ctx: &RunContext, text: String) -> Result<(ValidationResult, StageReport)> {
    let input_bytes = text.len();
    let config = ctx.config.validate.clone();
    let checker = Arc::clone(&ctx.checker);

    let validation = tokio::task::spawn_blocking(move || {
        llmdocs_validator::validate(&text, &config, checker.as_ref())
    })
    .await
    .map_err(|e| LlmDocsError::ValidatorUnavailable(format!("validation task failed: {e}")))??;

    artifacts::write_validation(&ctx.config.paths.validation_file, &validation)?;

    let mut report = StageReport {
        input_bytes: Some(input_bytes),
        ..StageReport::default()
    };
    counter(&mut report, "passed", validation.strict.passed);
    counter(&mut report, "failed", validation.strict.failed);
    counter(&mut report, "skipped", validation.strict.skipped);
    counter(&mut report, "incorrect", validation.syntax.incorrect.len());
    counter(&mut report, "missing", validation.patterns.missing.len());

    Ok((validation, report))
}
