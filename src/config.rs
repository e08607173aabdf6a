//! Configuration types for conformity analysis and report emission.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Report emission has its own small
//! [`ReportOptions`] because the spreadsheet writer is only resolved once a
//! result exists.

use crate::error::VerificaError;
use crate::pipeline::inference::InferenceBackend;
use crate::pipeline::report::SheetWriter;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Generative Language API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Environment variables searched, in order, for the API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"];

/// Configuration for one conformity analysis.
///
/// # Example
/// ```rust
/// use verifica_itp::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gemini-2.0-flash")
///     .encode_concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Explicit API key. If None, resolved from `api_key_env` at call time.
    pub api_key: Option<String>,

    /// Environment variables searched, in order, for the API key.
    /// Default: [`API_KEY_ENV_VARS`].
    pub api_key_env: Vec<String>,

    /// API base URL, without trailing `/models/...`. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Pre-constructed backend. Takes precedence over the HTTP client.
    pub backend: Option<Arc<dyn InferenceBackend>>,

    /// Maximum number of files read concurrently while encoding. Default: 8.
    pub encode_concurrency: usize,

    /// Whole-request timeout. Default: None (wait for the provider).
    pub request_timeout_secs: Option<u64>,

    /// Replacement evaluation prompt; `{company}` is substituted.
    pub prompt_override: Option<String>,

    /// Observer for pipeline progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: API_KEY_ENV_VARS.iter().map(|v| v.to_string()).collect(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            backend: None,
            encode_concurrency: 8,
            request_timeout_secs: None,
            prompt_override: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("encode_concurrency", &self.encode_concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("prompt_override", &self.prompt_override.is_some())
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key: explicit value first, then the environment.
    ///
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Result<String, VerificaError> {
        self.resolve_api_key_from(|var| std::env::var(var).ok())
    }

    /// [`resolve_api_key`](Self::resolve_api_key) with an explicit variable lookup.
    pub(crate) fn resolve_api_key_from(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, VerificaError> {
        let explicit = self.api_key.clone();
        let from_env = self.api_key_env.iter().map(|var| lookup(var.as_str()));
        std::iter::once(explicit)
            .chain(from_env)
            .flatten()
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or_else(|| {
                VerificaError::Configuration(format!(
                    "no API key configured; set {} or pass one explicitly",
                    self.api_key_env.join(" or ")
                ))
            })
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Replace the environment variables consulted for the API key.
    pub fn api_key_env<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.api_key_env = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn encode_concurrency(mut self, n: usize) -> Self {
        self.config.encode_concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn prompt_override(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_override = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, VerificaError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(VerificaError::Configuration("model must not be empty".into()));
        }
        if !(c.endpoint.starts_with("https://") || c.endpoint.starts_with("http://")) {
            return Err(VerificaError::Configuration(format!(
                "endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(VerificaError::Configuration(
                "request timeout must be at least 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Options for writing the spreadsheet report.
#[derive(Clone, Default)]
pub struct ReportOptions {
    /// Injected writer. If None, the built-in xlsx writer is resolved at call time.
    pub writer: Option<Arc<dyn SheetWriter>>,

    /// Directory the report is written into. Default: current directory.
    pub output_dir: Option<PathBuf>,
}

impl fmt::Debug for ReportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportOptions")
            .field("writer", &self.writer.as_ref().map(|w| w.name()))
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl ReportOptions {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn writer(mut self, writer: Arc<dyn SheetWriter>) -> Self {
        self.writer = Some(writer);
        self
    }
}
