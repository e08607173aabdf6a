//! Error types for the verifica-itp library.
//!
//! Every failure is fatal for the invocation that produced it: the pipeline
//! never hands back a partially-populated [`crate::output::ConformityResult`].
//! Variants follow the stage that raised them so callers (and the CLI) can
//! tell a missing credential from a model that answered off-schema.
//!
//! [`VerificaError::user_message`] collapses any variant into the single
//! message an end user sees at the top-level invocation boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Fixed message shown when the request context or file list is incomplete.
pub const VALIDATION_MESSAGE: &str = "Inserisci la ragione sociale e carica almeno un file PDF.";

/// Fixed message shown when the spreadsheet report cannot be produced.
pub const REPORT_MESSAGE: &str = "Errore durante la creazione del file Excel.";

/// All errors returned by the verifica-itp library.
#[derive(Debug, Error)]
pub enum VerificaError {
    // ── Request validation ────────────────────────────────────────────────
    /// Company name missing or no files supplied. Raised before any I/O.
    #[error("Invalid request: {0}")]
    Validation(String),

    // ── Encoding ──────────────────────────────────────────────────────────
    /// A file could not be read into memory; the whole batch is aborted.
    #[error("Failed to read '{name}': {source}")]
    Encoding {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration ─────────────────────────────────────────────────────
    /// No usable credential or a malformed endpoint.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Inference ─────────────────────────────────────────────────────────
    /// The provider answered with an explicit `error` object.
    #[error("{message}")]
    InferenceService { message: String },

    /// The request never produced an HTTP response (DNS, TLS, reset, timeout).
    #[error("Request to inference endpoint failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider's response has no usable `candidates[0].content.parts[0].text`.
    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    // ── Result normalisation ──────────────────────────────────────────────
    /// Model output is not valid JSON once code fences are stripped.
    #[error("Model output is not valid JSON: {detail}")]
    ResultParse { detail: String, raw: String },

    /// Model output is JSON but does not match the conformity result shape.
    #[error("Model output does not match the expected result shape: {0}")]
    ResultShape(String),

    // ── Report ────────────────────────────────────────────────────────────
    /// The spreadsheet collaborator was unavailable or failed to write.
    #[error("Report generation failed for '{path}': {detail}")]
    ReportGeneration { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerificaError {
    /// The one-line message to show an end user for this error.
    pub fn user_message(&self) -> String {
        match self {
            VerificaError::Validation(_) => VALIDATION_MESSAGE.to_string(),
            VerificaError::ReportGeneration { .. } => REPORT_MESSAGE.to_string(),
            other => format!("Errore tecnico: {other}"),
        }
    }

    /// `true` for errors raised before any network activity.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            VerificaError::Validation(_)
                | VerificaError::Configuration(_)
                | VerificaError::Encoding { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_service_message_is_verbatim() {
        let e = VerificaError::InferenceService {
            message: "quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "quota exceeded");
        assert_eq!(e.user_message(), "Errore tecnico: quota exceeded");
    }

    #[test]
    fn validation_maps_to_fixed_prompt() {
        let e = VerificaError::Validation("no files".into());
        assert_eq!(e.user_message(), VALIDATION_MESSAGE);
        assert!(e.is_pre_flight());
    }

    #[test]
    fn report_error_maps_to_fixed_message() {
        let e = VerificaError::ReportGeneration {
            path: PathBuf::from("Verifica_Acme.xlsx"),
            detail: "disk full".into(),
        };
        assert!(e.to_string().contains("disk full"));
        assert_eq!(e.user_message(), REPORT_MESSAGE);
        assert!(!e.is_pre_flight());
    }

    #[test]
    fn encoding_error_names_file() {
        let e = VerificaError::Encoding {
            name: "durc.pdf".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.to_string().contains("durc.pdf"));
        assert!(e.user_message().starts_with("Errore tecnico: "));
    }

    #[test]
    fn parse_error_keeps_raw_text() {
        let e = VerificaError::ResultParse {
            detail: "EOF while parsing".into(),
            raw: "{\"conformita_generale\": tr".into(),
        };
        match e {
            VerificaError::ResultParse { raw, .. } => assert!(raw.contains("conformita")),
            _ => unreachable!(),
        }
    }
}
