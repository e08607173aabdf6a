//! Top-level entry points.
//!
//! [`analyze`] runs the whole pipeline for one request context and file list
//! and either returns a complete, validated result or an error; there is no
//! partial outcome. [`download_report`] is separate because the report is
//! optional and its writer is only resolved when asked for.

use crate::config::{AnalysisConfig, ReportOptions};
use crate::error::VerificaError;
use crate::output::{AnalysisOutput, AnalysisStats, ConformityResult};
use crate::pipeline::inference::{self, GeminiClient, InferenceBackend};
use crate::pipeline::report::{self, Report};
use crate::pipeline::{encode, normalize};
use crate::session::{AnalysisRequestContext, InputFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Analyse `files` for the company in `context`.
///
/// # Errors
/// - [`VerificaError::Validation`]: blank company name or no files; raised
///   before anything is read or sent
/// - [`VerificaError::Configuration`]: no API key and no injected backend
/// - [`VerificaError::Encoding`]: a file could not be read
/// - [`VerificaError::InferenceService`] / [`VerificaError::RequestFailed`] /
///   [`VerificaError::MalformedResponse`]: provider-side failures
/// - [`VerificaError::ResultParse`] / [`VerificaError::ResultShape`]: the
///   model answered off-schema
pub async fn analyze(
    context: &AnalysisRequestContext,
    files: &[InputFile],
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, VerificaError> {
    context.validate(files.len())?;

    let outcome = run_pipeline(context, files, config).await;
    if let Some(ref cb) = config.progress_callback {
        match &outcome {
            Ok(out) => cb.on_analysis_complete(out.result.conformita_generale),
            Err(e) => cb.on_analysis_error(&e.to_string()),
        }
    }
    outcome
}

/// [`analyze`], returning only the conformity result.
pub async fn run_analysis(
    context: &AnalysisRequestContext,
    files: &[InputFile],
    config: &AnalysisConfig,
) -> Result<ConformityResult, VerificaError> {
    analyze(context, files, config).await.map(|out| out.result)
}

/// Synchronous wrapper around [`run_analysis`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_analysis_sync(
    context: &AnalysisRequestContext,
    files: &[InputFile],
    config: &AnalysisConfig,
) -> Result<ConformityResult, VerificaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| VerificaError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run_analysis(context, files, config))
}

/// Build the report workbook in memory.
pub async fn render_report(
    result: &ConformityResult,
    context: &AnalysisRequestContext,
    options: &ReportOptions,
) -> Result<(Report, Vec<u8>), VerificaError> {
    let report = Report::build(result, context);
    let writer = resolve_writer(&report, options)?;
    report::render(report, writer).await
}

/// Write `Verifica_<company>.xlsx` into the configured output directory.
///
/// Returns the path of the written file.
pub async fn download_report(
    result: &ConformityResult,
    context: &AnalysisRequestContext,
    options: &ReportOptions,
) -> Result<PathBuf, VerificaError> {
    let report = Report::build(result, context);
    let writer = resolve_writer(&report, options)?;
    let dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    report::emit(report, writer, &dir).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_pipeline(
    context: &AnalysisRequestContext,
    files: &[InputFile],
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, VerificaError> {
    let total_start = Instant::now();
    info!(
        "Starting analysis for '{}' with {} file(s)",
        context.company_name.trim(),
        files.len()
    );

    // ── Step 1: Resolve backend (fails fast on missing credentials) ──────
    let backend = resolve_backend(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(files.len());
    }

    // ── Step 2: Encode files ─────────────────────────────────────────────
    let encode_start = Instant::now();
    let parts = encode::encode_all(
        files,
        config.encode_concurrency,
        config.progress_callback.as_ref(),
    )
    .await?;
    let encode_duration_ms = encode_start.elapsed().as_millis() as u64;
    let encoded_bytes: usize = parts.iter().map(|p| p.data.len()).sum();
    debug!(
        "Encoded {} file(s), {} bytes base64, in {}ms",
        parts.len(),
        encoded_bytes,
        encode_duration_ms
    );

    // ── Step 3: Inference request ────────────────────────────────────────
    let request = inference::build_request(context, parts, config);
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_sent(request.part_count());
    }
    let inference_start = Instant::now();
    let raw_text = inference::request_analysis(backend.as_ref(), &request).await?;
    let inference_duration_ms = inference_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_response_received(raw_text.len());
    }

    // ── Step 4: Normalise ────────────────────────────────────────────────
    let result = normalize::normalize(&raw_text)?;

    let stats = AnalysisStats {
        files: files.len(),
        encoded_bytes,
        encode_duration_ms,
        inference_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: conformita_generale={}, {} document(s), {}ms total",
        result.conformita_generale,
        result.documenti.len(),
        stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        result,
        raw_text,
        stats,
    })
}

/// Pre-built backend first, otherwise the HTTP client with a freshly
/// resolved API key.
fn resolve_backend(config: &AnalysisConfig) -> Result<Arc<dyn InferenceBackend>, VerificaError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    Ok(Arc::new(GeminiClient::from_config(config)?))
}

fn resolve_writer(
    report: &Report,
    options: &ReportOptions,
) -> Result<Arc<dyn report::SheetWriter>, VerificaError> {
    report::resolve_writer(options.writer.as_ref()).map_err(|detail| {
        VerificaError::ReportGeneration {
            path: Path::new(&report.filename).to_path_buf(),
            detail,
        }
    })
}
