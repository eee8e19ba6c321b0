//! Pipeline orchestration for llmdocs.
//!
//! Ties fetching, extraction, LLM assembly, and validation into a single
//! sequential run (see [`pipeline::run`]).

pub mod artifacts;
pub mod assembler;
pub mod pipeline;
pub mod release;

pub use assembler::{LlmClient, OpenRouterClient};
pub use pipeline::{EventSink, RunContext, RunOptions, SilentSink, run};
