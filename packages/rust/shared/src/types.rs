//! Core domain types flowing between pipeline stages.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationResult;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A fetched and sanitized upstream document. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Configured source name (e.g. `jac-reference`).
    pub name: String,
    /// Upstream URL the document was fetched from.
    pub url: String,
    /// Sanitized Markdown text.
    pub content: String,
    /// Size of the sanitized content in bytes.
    pub size_bytes: usize,
    /// Size of the raw response body in bytes.
    pub raw_size_bytes: usize,
    /// SHA-256 of the sanitized content.
    pub content_hash: String,
    /// When the document was fetched.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Kind of construct a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Node,
    Edge,
    Walker,
    Obj,
    Class,
    Enum,
    Function,
    Ability,
    Global,
    Test,
}

impl RecordKind {
    /// The keyword that introduces this construct in source.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Walker => "walker",
            Self::Obj => "obj",
            Self::Class => "class",
            Self::Enum => "enum",
            Self::Function => "def",
            Self::Ability => "can",
            Self::Global => "glob",
            Self::Test => "test",
        }
    }

    /// Section title used when rendering records for the prompt.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Node => "Nodes",
            Self::Edge => "Edges",
            Self::Walker => "Walkers",
            Self::Obj => "Objects",
            Self::Class => "Classes",
            Self::Enum => "Enums",
            Self::Function => "Functions",
            Self::Ability => "Abilities",
            Self::Global => "Globals",
            Self::Test => "Tests",
        }
    }
}

/// A structured signature/example entry produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Declared name (e.g. `Person`).
    pub name: String,
    pub kind: RecordKind,
    /// Skeleton signature with bodies stripped.
    pub signature: String,
    /// Full canonical example the signature came from, when kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Name of the source document.
    pub source: String,
}

/// Ordered output of the extraction stage, persisted for `--skip-extract`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSet {
    /// Records in source order.
    pub records: Vec<Record>,
    /// Language keywords observed across all code blocks.
    pub keywords: BTreeSet<String>,
    /// Number of documents successfully processed.
    pub documents: usize,
    /// Names of documents skipped because they were malformed.
    #[serde(default)]
    pub skipped_documents: Vec<String>,
}

impl ExtractedSet {
    /// Number of records that carry a canonical example.
    pub fn example_count(&self) -> usize {
        self.records.iter().filter(|r| r.example.is_some()).count()
    }
}

/// The LLM-produced document awaiting validation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub size_bytes: usize,
    pub duration: std::time::Duration,
    /// Number of streamed chunks that made up the text.
    pub chunks: usize,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Extract,
    Assemble,
    Validate,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Extract, Stage::Assemble, Stage::Validate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Assemble => "assemble",
            Self::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl StageStatus {
    /// Whether a successor stage may start after this status.
    pub fn unblocks_successor(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

/// Per-stage metrics reported in the run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
    /// Stage-specific counters (documents, records, chunks, ...).
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub counters: std::collections::BTreeMap<String, u64>,
}

/// Reports for all four stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageReports {
    pub fetch: StageReport,
    pub extract: StageReport,
    pub assemble: StageReport,
    pub validate: StageReport,
}

impl StageReports {
    pub fn get(&self, stage: Stage) -> &StageReport {
        match stage {
            Stage::Fetch => &self.fetch,
            Stage::Extract => &self.extract,
            Stage::Assemble => &self.assemble,
            Stage::Validate => &self.validate,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut StageReport {
        match stage {
            Stage::Fetch => &mut self.fetch,
            Stage::Extract => &mut self.extract,
            Stage::Assemble => &mut self.assemble,
            Stage::Validate => &mut self.validate,
        }
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Process exit codes.
pub mod exit_code {
    /// Validation passed.
    pub const PASS: i32 = 0;
    /// Pipeline ran, recommendation is REVIEW.
    pub const REVIEW: i32 = 1;
    /// A stage raised a fatal condition.
    pub const PIPELINE_ERROR: i32 = 2;
}

/// Terminal artifact of a run. Written once, never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    /// UUID v7 of this run.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stages: StageReports,
    #[serde(default)]
    pub validation: Option<ValidationResult>,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Sanitized input bytes divided by candidate bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    /// Upstream language version observed before assembly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// A fresh summary with every stage pending.
    pub fn new() -> Self {
        Self {
            success: false,
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            stages: StageReports::default(),
            validation: None,
            output_path: None,
            compression_ratio: None,
            language_version: None,
            error: None,
        }
    }

    /// Exit code for this summary: 2 on pipeline error, else 0/1 by recommendation.
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() {
            return exit_code::PIPELINE_ERROR;
        }
        match &self.validation {
            Some(v) if v.recommendation.is_pass() => exit_code::PASS,
            Some(_) => exit_code::REVIEW,
            None => exit_code::PIPELINE_ERROR,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Progress/log event emitted by the orchestrator for UI consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage changed status.
    StageTransition { stage: Stage, status: StageStatus },
    /// A human-readable progress line.
    Log {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        message: String,
    },
    /// An incremental piece of the assembler's streamed response.
    Chunk { text: String },
    /// The final run summary.
    Summary { summary: Box<RunSummary> },
}
