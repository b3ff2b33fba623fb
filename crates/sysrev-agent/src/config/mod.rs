//! Configuration loading for sysrev.
//! Reads sysrev.toml from the path in SYSREV_CONFIG, else the current
//! directory; without either, every setting takes its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use sysrev_common::SysrevError;
use sysrev_ingestion::docling::DOCLING_DEFAULT_URL;
use sysrev_ingestion::sources::table::{DEFAULT_PAPER_CHARS, DEFAULT_TABLE_CHARS};
use sysrev_ingestion::sources::text::DEFAULT_TEXT_CHARS;
use sysrev_llm::{BackendConfig, BackendKind, RetryPolicy};
use sysrev_merge::FieldSchema;

pub const CONFIG_ENV: &str = "SYSREV_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sysrev.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub docling: DoclingConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub normaliser: NormaliserConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
}

// ── [llm] ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Falls back to the provider's default model.
    pub model: Option<String>,
    /// Falls back to the provider's environment variables.
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_provider()        -> String { "claude".to_string() }
fn default_max_tokens()      -> u32    { 4096 }
fn default_llm_timeout()     -> u64    { 180 }
fn default_max_input_chars() -> usize  { DEFAULT_TEXT_CHARS }
fn default_retries()         -> u32    { 3 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
            max_input_chars: default_max_input_chars(),
            retries: default_retries(),
        }
    }
}

// ── [docling] ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DoclingConfig {
    #[serde(default = "default_docling_url")]
    pub base_url: String,
    #[serde(default = "default_docling_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_paper_chars")]
    pub max_paper_chars: usize,
    #[serde(default = "default_table_chars")]
    pub max_table_chars: usize,
}

fn default_docling_url()     -> String { DOCLING_DEFAULT_URL.to_string() }
fn default_docling_timeout() -> u64    { 300 }
fn default_paper_chars()     -> usize  { DEFAULT_PAPER_CHARS }
fn default_table_chars()     -> usize  { DEFAULT_TABLE_CHARS }

impl Default for DoclingConfig {
    fn default() -> Self {
        Self {
            base_url: default_docling_url(),
            timeout_secs: default_docling_timeout(),
            max_paper_chars: default_paper_chars(),
            max_table_chars: default_table_chars(),
        }
    }
}

// ── [run] ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_pdf_folder")]
    pub pdf_folder: PathBuf,
    /// One filename per line; used instead of a folder scan when it exists.
    pub files_list: Option<PathBuf>,
    #[serde(default = "default_output_csv")]
    pub output_csv: PathBuf,
    /// Timestamped name per provider when unset.
    pub screening_csv: Option<PathBuf>,
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: f64,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

fn default_pdf_folder()       -> PathBuf { PathBuf::from(".") }
fn default_output_csv()       -> PathBuf { PathBuf::from("extraction_results.csv") }
fn default_progress_file()    -> PathBuf { PathBuf::from("review_progress.json") }
fn default_concurrency()      -> usize   { 2 }
fn default_rate_limit_delay() -> f64     { 5.0 }
fn default_checkpoint_every() -> usize   { 10 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pdf_folder: default_pdf_folder(),
            files_list: None,
            output_csv: default_output_csv(),
            screening_csv: None,
            progress_file: default_progress_file(),
            concurrency: default_concurrency(),
            rate_limit_delay_secs: default_rate_limit_delay(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

// ── [schema], [normaliser], [screening] ───────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    /// TOML field table replacing the built-in schema.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormaliserConfig {
    /// Extra phrases meaning "no value".
    #[serde(default)]
    pub extra_missing: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreeningConfig {
    /// Replaces the default inclusion criteria when non-empty.
    #[serde(default)]
    pub inclusion: Vec<String>,
    #[serde(default)]
    pub exclusion: Vec<String>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub pdf_folder: Option<PathBuf>,
    pub files_list: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load configuration. SYSREV_CONFIG must name an existing file when
    /// set; the default file is optional.
    pub fn load() -> Result<Self, SysrevError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(SysrevError::config(format!(
                        "{CONFIG_ENV} points to {} which does not exist",
                        path.display()
                    )));
                }
                Self::from_file(&path)
            }
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SysrevError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SysrevError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SysrevError> {
        let config: Config = toml::from_str(content).map_err(|e| SysrevError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(p) = &o.provider {
            self.llm.provider = p.clone();
            // A model named for one provider means nothing to another.
            if o.model.is_none() {
                self.llm.model = None;
            }
        }
        if let Some(m) = &o.model {
            self.llm.model = Some(m.clone());
        }
        if let Some(f) = &o.pdf_folder {
            self.run.pdf_folder = f.clone();
        }
        if let Some(l) = &o.files_list {
            self.run.files_list = Some(l.clone());
        }
        if let Some(out) = &o.output {
            self.run.output_csv = out.clone();
            self.run.screening_csv = Some(out.clone());
        }
    }

    pub fn validate(&self) -> Result<(), SysrevError> {
        self.backend_kind()?;
        if self.run.concurrency == 0 {
            return Err(SysrevError::config("run.concurrency must be at least 1"));
        }
        if self.run.checkpoint_every == 0 {
            return Err(SysrevError::config("run.checkpoint_every must be at least 1"));
        }
        if !self.run.rate_limit_delay_secs.is_finite() || self.run.rate_limit_delay_secs < 0.0 {
            return Err(SysrevError::config("run.rate_limit_delay_secs must be a non-negative number"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SysrevError::config("llm.temperature must be between 0 and 2"));
        }
        Ok(())
    }

    pub fn backend_kind(&self) -> Result<BackendKind, SysrevError> {
        self.llm.provider.parse().map_err(SysrevError::Configuration)
    }

    /// The configured key, else the first provider variable that is set.
    pub fn api_key(&self) -> Result<SecretString, SysrevError> {
        let kind = self.backend_kind()?;
        if let Some(key) = &self.llm.api_key {
            return Ok(key.clone());
        }
        kind.api_key_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .map(SecretString::from)
            .ok_or_else(|| {
                SysrevError::config(format!(
                    "no API key for {kind}: set llm.api_key or one of {}",
                    kind.api_key_vars().join(", ")
                ))
            })
    }

    pub fn backend_config(&self) -> Result<BackendConfig, SysrevError> {
        Ok(BackendConfig {
            kind: self.backend_kind()?,
            model: self.llm.model.clone(),
            api_key: self.api_key()?,
            base_url: self.llm.base_url.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_attempts: self.llm.retries.max(1), ..RetryPolicy::default() }
    }

    pub fn schema(&self) -> Result<FieldSchema, SysrevError> {
        match &self.schema.path {
            Some(path) => FieldSchema::load(path),
            None => Ok(FieldSchema::builtin()),
        }
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.run.rate_limit_delay_secs)
    }

    /// Screening output path, timestamped per provider when not configured.
    pub fn screening_csv(&self) -> PathBuf {
        self.run.screening_csv.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "systematic_review_{}_{}.csv",
                self.llm.provider.to_lowercase(),
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ))
        })
    }
}

#[cfg(test)]
mod tests;
