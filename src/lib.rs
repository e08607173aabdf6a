//! # verifica-itp
//!
//! Check a contractor's site-access documents (Visura camerale, DURC, DVR,
//! Patente a crediti) for conformity under D.Lgs 81/08 using a
//! document-understanding model, and export the verdict as a spreadsheet.
//!
//! The crate does not parse PDFs itself. Documents are sent as-is to the
//! Generative Language API together with a fixed evaluation prompt; the
//! model's JSON answer is validated strictly before anything is shown.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Collect   caller-held ordered file list
//!  ├─ 2. Encode    read each file, base64 inline part (concurrent, ordered)
//!  ├─ 3. Infer     one generateContent request: prompt + all documents
//!  ├─ 4. Normalise strip fences, validate JSON shape
//!  └─ 5. Report    Verifica_<company>.xlsx (on demand)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verifica_itp::{
//!     download_report, run_analysis, AnalysisConfig, AnalysisRequestContext, InputFile,
//!     ReportOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let context = AnalysisRequestContext::new("Acme Srl").site_name("Scuola Verdi");
//!     let files = vec![InputFile::from_path("durc.pdf"), InputFile::from_path("dvr.pdf")];
//!
//!     let result = run_analysis(&context, &files, &config).await?;
//!     println!("conforme: {}", result.conformita_generale);
//!
//!     let path = download_report(&result, &context, &ReportOptions::default()).await?;
//!     println!("report: {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `verifica-itp` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `xlsx`  | on      | Built-in `.xlsx` report writer (rust_xlsxwriter) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, download_report, render_report, run_analysis, run_analysis_sync};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, ReportOptions};
pub use error::VerificaError;
pub use output::{AnalysisOutput, AnalysisStats, ConformityResult, DocumentOutcome, REQUIRED_DOCUMENTS};
pub use pipeline::encode::EncodedPart;
pub use pipeline::inference::{GeminiClient, GenerateContentRequest, InferenceBackend};
pub use pipeline::report::{Report, ReportRow, SheetWriter};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{AnalysisRequestContext, AnalysisSession, FileCollector, InputFile};
