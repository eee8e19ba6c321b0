//! Shared types, error model, and configuration for llmdocs.
//!
//! This crate is the foundation depended on by all other llmdocs crates.
//! It provides:
//! - [`LlmDocsError`], the unified error type
//! - Domain types ([`Document`], [`Record`], [`RunSummary`], [`PipelineEvent`])
//! - Validation result types ([`ValidationResult`], [`Recommendation`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod fs;
pub mod types;
pub mod validation;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssemblyConfig, CONFIG_FILE_NAME, ExtractConfig, MAX_STRICT_ERRORS, PathsConfig,
    SanitizeConfig, SourceConfig, SourceKind, ValidateConfig, VersionConfig, api_key, config_dir,
    init_config, load_config, load_config_from, resolve_config_path,
};
pub use error::{LlmDocsError, Result};
pub use types::{
    Candidate, Document, ExtractedSet, PipelineEvent, Record, RecordKind, RunSummary, Stage,
    StageReport, StageReports, StageStatus, exit_code,
};
pub use validation::{
    IncorrectSyntax, PatternResult, Recommendation, StrictError, StrictResult, SyntaxCheck,
    SyntaxResult, ValidationResult,
};
