//! Application configuration for llmdocs.
//!
//! Lookup order: an explicit `--config` path, `./llmdocs.toml`, then
//! `~/.llmdocs/llmdocs.toml`. Missing files fall back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LlmDocsError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "llmdocs.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".llmdocs";

// ---------------------------------------------------------------------------
// Config structs (matching llmdocs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Artifact locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Upstream documents to fetch.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    /// Markdown sanitization.
    #[serde(default)]
    pub sanitize: SanitizeConfig,

    /// Signature extraction.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// LLM assembly.
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Candidate validation.
    #[serde(default)]
    pub validate: ValidateConfig,

    /// Upstream version tracking.
    #[serde(default)]
    pub version: VersionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            sources: default_sources(),
            sanitize: SanitizeConfig::default(),
            extract: ExtractConfig::default(),
            assembly: AssemblyConfig::default(),
            validate: ValidateConfig::default(),
            version: VersionConfig::default(),
        }
    }
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw and sanitized document cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Extracted records, reused by `--skip-extract`.
    #[serde(default = "default_records_file")]
    pub records_file: PathBuf,

    /// Assembled candidate document (overwritten each run).
    #[serde(default = "default_candidate_file")]
    pub candidate_file: PathBuf,

    /// Validation result for the current candidate.
    #[serde(default = "default_validation_file")]
    pub validation_file: PathBuf,

    /// Release directory holding `VERSION` and archived releases.
    #[serde(default = "default_release_dir")]
    pub release_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            records_file: default_records_file(),
            candidate_file: default_candidate_file(),
            validation_file: default_validation_file(),
            release_dir: default_release_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("output/0_fetched")
}
fn default_records_file() -> PathBuf {
    PathBuf::from("output/1_extracted/records.json")
}
fn default_candidate_file() -> PathBuf {
    PathBuf::from("release/jac-llmdocs.md")
}
fn default_validation_file() -> PathBuf {
    PathBuf::from("release/jac-llmdocs.validation.json")
}
fn default_release_dir() -> PathBuf {
    PathBuf::from("release")
}

/// Format of an upstream document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Markdown,
    Html,
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable name, also used as the cache file stem.
    pub name: String,
    pub url: String,
    /// A failure to fetch a required source aborts the stage.
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub kind: SourceKind,
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "jac-readme".into(),
            url: "https://raw.githubusercontent.com/jaseci-labs/jaseci/main/jac/README.md".into(),
            required: true,
            kind: SourceKind::Markdown,
        },
        SourceConfig {
            name: "jaseci-readme".into(),
            url: "https://raw.githubusercontent.com/jaseci-labs/jaseci/main/README.md".into(),
            required: false,
            kind: SourceKind::Markdown,
        },
    ]
}

/// `[sanitize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeConfig {
    /// Headings whose whole section is dropped (case-insensitive).
    #[serde(default = "default_excluded_sections")]
    pub excluded_sections: Vec<String>,

    /// Documents shorter than this after sanitization are dropped.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            excluded_sections: default_excluded_sections(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

fn default_excluded_sections() -> Vec<String> {
    ["Contributing", "License", "Changelog", "Community", "Acknowledgements"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
fn default_min_content_chars() -> usize {
    200
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Fence info-string tags treated as the target language.
    #[serde(default = "default_language_tags")]
    pub language_tags: Vec<String>,

    /// Maximum canonical examples kept per record kind.
    #[serde(default = "default_max_examples_per_kind")]
    pub max_examples_per_kind: usize,

    /// Examples longer than this are kept as signatures only.
    #[serde(default = "default_max_example_chars")]
    pub max_example_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            language_tags: default_language_tags(),
            max_examples_per_kind: default_max_examples_per_kind(),
            max_example_chars: default_max_example_chars(),
        }
    }
}

fn default_language_tags() -> Vec<String> {
    vec!["jac".into(), "jaclang".into()]
}
fn default_max_examples_per_kind() -> usize {
    10
}
fn default_max_example_chars() -> usize {
    1_500
}

/// `[assembly]` section. Values pass through to the provider verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prompt template file containing a `{content}` placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            prompt_template: None,
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    32_000
}
fn default_timeout_secs() -> u64 {
    600
}

/// `[validate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Fence tags whose blocks are strictly checked.
    #[serde(default = "default_language_tags")]
    pub language_tags: Vec<String>,

    /// External checker executable.
    #[serde(default = "default_checker_command")]
    pub checker_command: String,

    /// Arguments placed before the temporary file path.
    #[serde(default = "default_checker_args")]
    pub checker_args: Vec<String>,

    /// Extension of the temporary file handed to the checker.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Cap on reported strict-check errors, at most [`MAX_STRICT_ERRORS`].
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            language_tags: default_language_tags(),
            checker_command: default_checker_command(),
            checker_args: default_checker_args(),
            file_extension: default_file_extension(),
            max_errors: default_max_errors(),
        }
    }
}

fn default_checker_command() -> String {
    "jac".into()
}
fn default_checker_args() -> Vec<String> {
    vec!["check".into()]
}
fn default_file_extension() -> String {
    "jac".into()
}
/// Upper bound on the strict-check error list.
pub const MAX_STRICT_ERRORS: usize = 10;

fn default_max_errors() -> usize {
    MAX_STRICT_ERRORS
}

/// `[version]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    /// File whose `version = "x.y.z"` line names the upstream release.
    /// Leave unset to disable release archiving.
    #[serde(default = "default_version_url")]
    pub url: Option<String>,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            url: default_version_url(),
        }
    }
}

fn default_version_url() -> Option<String> {
    Some("https://raw.githubusercontent.com/jaseci-labs/jaseci/main/jac/pyproject.toml".into())
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the per-user config directory (`~/.llmdocs/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LlmDocsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Resolve which config file applies, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(LlmDocsError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    let user = config_dir()?.join(CONFIG_FILE_NAME);
    if user.exists() {
        return Ok(Some(user));
    }

    Ok(None)
}

/// Load the application config. Returns defaults if no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match resolve_config_path(explicit)? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LlmDocsError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LlmDocsError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    tracing::debug!(path = %path.display(), sources = config.sources.len(), "config loaded");
    Ok(config)
}

/// Reject configs that cannot drive a run.
fn validate_config(config: &AppConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.name.as_str()) {
            return Err(LlmDocsError::config(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
        url::Url::parse(&source.url).map_err(|e| {
            LlmDocsError::config(format!("source '{}' has invalid URL: {e}", source.name))
        })?;
    }
    if config.validate.language_tags.is_empty() {
        return Err(LlmDocsError::config("validate.language_tags must not be empty"));
    }
    if config.validate.max_errors > MAX_STRICT_ERRORS {
        return Err(LlmDocsError::config(format!(
            "validate.max_errors must be at most {MAX_STRICT_ERRORS}, got {}",
            config.validate.max_errors
        )));
    }
    Ok(())
}

/// Write a default config file into `dir`. Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| LlmDocsError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(LlmDocsError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| LlmDocsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LlmDocsError::io(&path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path)
}

/// Read the LLM API key from the configured env var.
pub fn api_key(config: &AssemblyConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LlmDocsError::precondition(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("candidate_file"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.validate.max_errors, 10);
        assert_eq!(parsed.assembly.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(parsed.sources.len(), 2);
    }

    #[test]
    fn config_with_sources() {
        let toml_str = r#"
[paths]
candidate_file = "/tmp/out.md"

[[sources]]
name = "reference"
url = "https://example.com/ref.md"

[[sources]]
name = "site"
url = "https://example.com/docs/"
required = false
kind = "html"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 2);
        assert!(config.sources[0].required);
        assert_eq!(config.sources[1].kind, SourceKind::Html);
        assert_eq!(config.paths.candidate_file, PathBuf::from("/tmp/out.md"));
        assert_eq!(config.validate.checker_command, "jac");
    }

    #[test]
    fn duplicate_source_names_rejected() {
        let mut config = AppConfig::default();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn error_cap_above_ten_rejected() {
        let dir = std::env::temp_dir().join(format!("llmdocs-cfg-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[validate]\nmax_errors = 50\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, LlmDocsError::Config { .. }));
        assert!(err.to_string().contains("max_errors"));

        std::fs::write(&path, "[validate]\nmax_errors = 3\n").unwrap();
        assert_eq!(load_config_from(&path).unwrap().validate.max_errors, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn api_key_missing_is_precondition() {
        let config = AssemblyConfig {
            // Use a unique env var name to avoid interfering with other tests
            api_key_env: "LLMDOCS_TEST_NONEXISTENT_KEY_12345".into(),
            ..AssemblyConfig::default()
        };
        let err = api_key(&config).unwrap_err();
        assert!(matches!(err, LlmDocsError::Precondition(_)));
        assert!(err.to_string().contains("API key not found"));
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
