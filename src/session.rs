//! Caller-owned inputs and session state.
//!
//! The pipeline itself is stateless; everything that lives between calls
//! (the file list, the form fields, the last result or error) is held here by
//! the caller and passed into each invocation explicitly.

use crate::analyze;
use crate::config::{AnalysisConfig, ReportOptions};
use crate::error::VerificaError;
use crate::output::ConformityResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ── Input files ──────────────────────────────────────────────────────────

/// Where an [`InputFile`]'s bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read from disk when the encoder runs.
    Path(PathBuf),
    /// Already in memory (uploads, tests).
    Bytes(Arc<[u8]>),
}

/// An opaque binary document with a display name. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    source: FileSource,
}

impl InputFile {
    /// A file on disk, named after its final path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    /// An in-memory file.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Bytes(Arc::from(bytes.into())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Path on disk, if this file is path-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(p) => Some(p),
            FileSource::Bytes(_) => None,
        }
    }
}

// ── File collector ───────────────────────────────────────────────────────

/// Ordered, mutable list of files selected by the user.
///
/// Indices are positions, not identities: removing an element shifts every
/// later element down by one.
#[derive(Debug, Clone, Default)]
pub struct FileCollector {
    files: Vec<InputFile>,
}

impl FileCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files after the existing ones, keeping prior order.
    pub fn add(&mut self, files: impl IntoIterator<Item = InputFile>) {
        let before = self.files.len();
        self.files.extend(files);
        debug!("Collected {} file(s), {} total", self.files.len() - before, self.files.len());
    }

    /// Remove the file at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<InputFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn as_slice(&self) -> &[InputFile] {
        &self.files
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(InputFile::name).collect()
    }
}

// ── Request context ──────────────────────────────────────────────────────

/// User-supplied metadata for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequestContext {
    /// Ragione sociale of the contractor under review. Required.
    pub company_name: String,
    /// Client commissioning the works.
    pub committente: Option<String>,
    /// Construction site name.
    pub site_name: Option<String>,
    /// Construction site address.
    pub site_address: Option<String>,
}

impl AnalysisRequestContext {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ..Self::default()
        }
    }

    pub fn committente(mut self, value: impl Into<String>) -> Self {
        self.committente = Some(value.into());
        self
    }

    pub fn site_name(mut self, value: impl Into<String>) -> Self {
        self.site_name = Some(value.into());
        self
    }

    pub fn site_address(mut self, value: impl Into<String>) -> Self {
        self.site_address = Some(value.into());
        self
    }

    /// Check the preconditions for issuing a request with `file_count` files.
    pub fn validate(&self, file_count: usize) -> Result<(), VerificaError> {
        if self.company_name.trim().is_empty() {
            return Err(VerificaError::Validation(
                "company name must not be empty".into(),
            ));
        }
        if file_count == 0 {
            return Err(VerificaError::Validation(
                "at least one file is required".into(),
            ));
        }
        Ok(())
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// Everything a front end keeps between pipeline calls.
///
/// A failed analysis records a user-facing message and leaves any previous
/// result untouched; a successful one replaces the result and clears the error.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    files: FileCollector,
    pub context: AnalysisRequestContext,
    result: Option<ConformityResult>,
    error: Option<String>,
    analyzing: bool,
}

/// Clears the in-progress flag even if the analysis future is dropped.
struct InProgress<'a>(&'a mut bool);

impl<'a> InProgress<'a> {
    fn set(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

impl AnalysisSession {
    pub fn new(context: AnalysisRequestContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    /// Append files and clear any displayed error.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = InputFile>) {
        self.files.add(files);
        self.error = None;
    }

    pub fn remove_file(&mut self, index: usize) -> Option<InputFile> {
        self.files.remove(index)
    }

    pub fn files(&self) -> &FileCollector {
        &self.files
    }

    pub fn result(&self) -> Option<&ConformityResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True only while [`run_analysis`](Self::run_analysis) is running. The
    /// exclusive borrow already rules out overlapping runs; the flag is for
    /// front ends that render a busy state, and is cleared even if the run is
    /// cancelled.
    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    /// Whether an analysis may be started right now.
    pub fn can_analyze(&self) -> bool {
        !self.analyzing && !self.files.is_empty() && !self.context.company_name.is_empty()
    }

    /// Drop files, result and error; keep the form fields.
    pub fn reset(&mut self) {
        self.files.clear();
        self.result = None;
        self.error = None;
    }

    /// Run the pipeline over the current files and context.
    pub async fn run_analysis(
        &mut self,
        config: &AnalysisConfig,
    ) -> Result<&ConformityResult, VerificaError> {
        if let Err(e) = self.context.validate(self.files.len()) {
            self.error = Some(e.user_message());
            return Err(e);
        }
        self.error = None;

        let outcome = {
            let _flag = InProgress::set(&mut self.analyzing);
            analyze::run_analysis(&self.context, self.files.as_slice(), config).await
        };

        match outcome {
            Ok(result) => Ok(&*self.result.insert(result)),
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Write the report for the current result.
    ///
    /// Returns `Ok(None)` when no result exists yet.
    pub async fn download_report(
        &mut self,
        options: &ReportOptions,
    ) -> Result<Option<PathBuf>, VerificaError> {
        let Some(result) = self.result.as_ref() else {
            return Ok(None);
        };
        match analyze::download_report(result, &self.context, options).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }
}
