//! Result types produced by the analysis pipeline.
//!
//! [`ConformityResult`] is the canonical, already-validated shape of the
//! model's answer. It can only be built by the normaliser (or by tests via
//! [`ConformityResult::new`]), so holding one means every required document
//! key is present and every outcome is a strict boolean.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Document keys the evaluation prompt asks for, in prompt order.
pub const REQUIRED_DOCUMENTS: [&str; 4] = ["visura", "durc", "dvr", "patente"];

/// Outcome for a single document category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub conforme: bool,
    pub note: String,
}

/// Validated conformity determination returned by the model.
///
/// `documenti` keeps the order the model emitted; unrecognised extra keys are
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformityResult {
    pub conformita_generale: bool,
    pub documenti: Vec<(String, DocumentOutcome)>,
    pub note_finali: String,
}

impl ConformityResult {
    pub fn new(
        conformita_generale: bool,
        documenti: Vec<(String, DocumentOutcome)>,
        note_finali: impl Into<String>,
    ) -> Self {
        Self {
            conformita_generale,
            documenti,
            note_finali: note_finali.into(),
        }
    }

    /// Look up a document outcome by key.
    pub fn document(&self, key: &str) -> Option<&DocumentOutcome> {
        self.documenti
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    /// Keys of all documents judged non-conforming, in emitted order.
    pub fn non_conforming(&self) -> Vec<&str> {
        self.documenti
            .iter()
            .filter(|(_, outcome)| !outcome.conforme)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Required document keys absent from `documenti`.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_DOCUMENTS
            .iter()
            .copied()
            .filter(|key| self.document(key).is_none())
            .collect()
    }

    /// Keys present in `documenti` beyond the four required ones.
    pub fn extra_documents(&self) -> Vec<&str> {
        self.documenti
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(|k| !REQUIRED_DOCUMENTS.contains(k))
            .collect()
    }
}

impl Serialize for ConformityResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Documents<'a>(&'a [(String, DocumentOutcome)]);

        impl Serialize for Documents<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (key, outcome) in self.0 {
                    map.serialize_entry(key, outcome)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("conformita_generale", &self.conformita_generale)?;
        map.serialize_entry("documenti", &Documents(&self.documenti))?;
        map.serialize_entry("note_finali", &self.note_finali)?;
        map.end()
    }
}

/// Timing and size figures for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Number of files attached to the request.
    pub files: usize,
    /// Total base64 payload size in bytes.
    pub encoded_bytes: usize,
    pub encode_duration_ms: u64,
    pub inference_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Full output of [`crate::analyze::analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub result: ConformityResult,
    /// Model text exactly as received, before fence stripping.
    pub raw_text: String,
    pub stats: AnalysisStats,
}
