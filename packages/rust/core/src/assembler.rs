//! Single-request LLM assembly of the candidate document.
//!
//! The extracted records are rendered into a prompt template and sent to an
//! OpenRouter-compatible chat completions endpoint. The response is streamed
//! as server-sent events; each delta is handed to the caller as it arrives
//! and the candidate is the concatenation of all deltas.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use llmdocs_shared::{AssemblyConfig, Candidate, LlmDocsError, Result};

/// Built-in prompt used when no template file is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are writing a compact, authoritative reference for the Jac programming \
language, intended to be read by other language models before they write Jac.

Rules:
- Every code example must be valid Jac that compiles as written.
- Use `True`/`False`/`None`, typed attributes (`has name: type;`), \
`import from module { name }`, `visit [-->];`, `root spawn Walker();`, and \
`with entry { ... }` for top-level statements.
- Put any intentionally invalid example in a fence tagged `jac wrong`.
- Prefer dense signature listings over prose. Do not invent constructs that \
are not present in the material below.

Extracted signatures and examples:

{content}
";

/// Placeholder replaced by the formatted records.
const CONTENT_PLACEHOLDER: &str = "{content}";

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Load the configured prompt template, or the built-in one.
pub fn load_template(config: &AssemblyConfig) -> Result<String> {
    let Some(path) = &config.prompt_template else {
        return Ok(DEFAULT_PROMPT_TEMPLATE.to_string());
    };
    read_template(path)
}

fn read_template(path: &Path) -> Result<String> {
    let template = std::fs::read_to_string(path).map_err(|e| LlmDocsError::io(path, e))?;
    if !template.contains(CONTENT_PLACEHOLDER) {
        return Err(LlmDocsError::config(format!(
            "prompt template {} has no {CONTENT_PLACEHOLDER} placeholder",
            path.display()
        )));
    }
    Ok(template)
}

/// Substitute `content` into the template.
pub fn build_prompt(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A text-generation service that streams its response.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and stream the response, calling `on_chunk` for each
    /// piece in arrival order. Returns the full text.
    async fn stream(
        &self,
        prompt: &str,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String>;
}

/// Streaming client for OpenRouter (or any OpenAI-compatible) chat completions.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterClient {
    /// Build a client from the `[assembly]` section and a resolved API key.
    pub fn new(config: &AssemblyConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("llmdocs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmDocsError::Assembly(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// One parsed line of an event stream.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> Result<SseLine> {
    // Blank separators and `: keep-alive` comments carry no data.
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignore);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmDocsError::Assembly(format!("malformed stream event: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(LlmDocsError::Assembly(format!("provider error: {}", err.message)));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    if text.is_empty() {
        Ok(SseLine::Ignore)
    } else {
        Ok(SseLine::Delta(text))
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_bytes = prompt.len()))]
    async fn stream(
        &self,
        prompt: &str,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmDocsError::Assembly(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmDocsError::Assembly(format!(
                "HTTP {status}: {}",
                detail.trim()
            )));
        }

        let mut bytes = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut text = String::new();

        'stream: while let Some(piece) = bytes.next().await {
            let piece =
                piece.map_err(|e| LlmDocsError::Assembly(format!("stream interrupted: {e}")))?;
            pending.extend_from_slice(&piece);

            // Split on complete lines only; a multi-byte char may straddle pieces.
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_sse_line(line.trim())? {
                    SseLine::Delta(delta) => {
                        on_chunk(&delta);
                        text.push_str(&delta);
                    }
                    SseLine::Done => break 'stream,
                    SseLine::Ignore => {}
                }
            }
        }

        if let SseLine::Delta(delta) = parse_sse_line(String::from_utf8_lossy(&pending).trim())? {
            on_chunk(&delta);
            text.push_str(&delta);
        }

        debug!(bytes = text.len(), "stream finished");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Issue exactly one request for `prompt` and collect the candidate.
///
/// An empty or whitespace-only response is an assembly failure.
#[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
pub async fn assemble(
    client: &dyn LlmClient,
    prompt: &str,
    mut on_chunk: impl FnMut(&str) + Send,
) -> Result<Candidate> {
    let start = Instant::now();
    let mut chunks = 0usize;

    let text = client
        .stream(prompt, &mut |delta: &str| {
            chunks += 1;
            on_chunk(delta);
        })
        .await?;

    if text.trim().is_empty() {
        return Err(LlmDocsError::Assembly("empty response".into()));
    }

    let candidate = Candidate {
        size_bytes: text.len(),
        duration: start.elapsed(),
        chunks,
        text,
    };
    info!(
        bytes = candidate.size_bytes,
        chunks = candidate.chunks,
        elapsed_ms = candidate.duration.as_millis() as u64,
        "assembly complete"
    );
    Ok(candidate)
}
