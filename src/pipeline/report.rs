//! Report emission: [`ConformityResult`] + context → spreadsheet artifact.
//!
//! The row layout is built here as plain data ([`Report`]); turning it into a
//! workbook is delegated to a [`SheetWriter`]. The writer is only resolved
//! when a report is actually requested, so the analysis path never touches it.
//!
//! ## Layout
//!
//! ```text
//! REPORT VERIFICA ITP
//! Impresa      <company>
//! Committente  <client>
//! Cantiere     <site>
//! Indirizzo    <address>
//!
//! Documento    Esito          Note
//! VISURA       OK             …
//! DURC         NON CONFORME   …
//! ```

use crate::error::VerificaError;
use crate::output::ConformityResult;
use crate::session::AnalysisRequestContext;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const REPORT_TITLE: &str = "REPORT VERIFICA ITP";
pub const SHEET_NAME: &str = "Analisi";
pub const COLUMN_HEADERS: [&str; 3] = ["Documento", "Esito", "Note"];
pub const OUTCOME_OK: &str = "OK";
pub const OUTCOME_NON_CONFORME: &str = "NON CONFORME";

/// One data row: `(label, outcome, note)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub label: String,
    pub outcome: String,
    pub note: String,
}

/// A fully laid-out report, ready for a [`SheetWriter`].
#[derive(Debug, Clone)]
pub struct Report {
    pub filename: String,
    pub sheet_name: String,
    pub header: Vec<Vec<String>>,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Rows before the first data row: title, four metadata rows, blank, column headers.
    pub const HEADER_ROWS: usize = 7;

    /// Index of the column-header row within [`Report::grid`].
    pub const COLUMN_HEADER_ROW: usize = Self::HEADER_ROWS - 1;

    /// Lay out `result` for the company described by `context`.
    pub fn build(result: &ConformityResult, context: &AnalysisRequestContext) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        let header = vec![
            vec![REPORT_TITLE.to_string()],
            vec!["Impresa".to_string(), context.company_name.clone()],
            vec!["Committente".to_string(), field(&context.committente)],
            vec!["Cantiere".to_string(), field(&context.site_name)],
            vec!["Indirizzo".to_string(), field(&context.site_address)],
            vec![String::new()],
            COLUMN_HEADERS.iter().map(|h| h.to_string()).collect(),
        ];

        let rows = result
            .documenti
            .iter()
            .map(|(key, outcome)| ReportRow {
                label: key.to_uppercase(),
                outcome: outcome_label(outcome.conforme).to_string(),
                note: outcome.note.clone(),
            })
            .collect();

        Self {
            filename: report_filename(&context.company_name),
            sheet_name: SHEET_NAME.to_string(),
            header,
            rows,
        }
    }

    /// Header block followed by data rows, as an array of arrays.
    pub fn grid(&self) -> Vec<Vec<String>> {
        let mut grid = self.header.clone();
        grid.extend(
            self.rows
                .iter()
                .map(|r| vec![r.label.clone(), r.outcome.clone(), r.note.clone()]),
        );
        grid
    }
}

/// `"OK"` or `"NON CONFORME"`.
pub fn outcome_label(conforme: bool) -> &'static str {
    if conforme {
        OUTCOME_OK
    } else {
        OUTCOME_NON_CONFORME
    }
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_PATH_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|]"#).unwrap());

/// `Verifica_<company>.xlsx`, each whitespace run collapsed to one `_`.
///
/// Characters that cannot appear in a file name are replaced with `_` too.
pub fn report_filename(company_name: &str) -> String {
    let joined = RE_WHITESPACE.replace_all(company_name, "_");
    let safe = RE_PATH_UNSAFE.replace_all(&joined, "_");
    format!("Verifica_{safe}.xlsx")
}

// ── Writer collaborator ──────────────────────────────────────────────────

/// Error type returned by [`SheetWriter`] implementations.
pub type SheetError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a [`Report`] into workbook bytes and persists them.
///
/// Both methods run on a blocking thread.
pub trait SheetWriter: Send + Sync {
    fn build_sheet(&self, report: &Report) -> Result<Vec<u8>, SheetError>;

    /// Write `bytes` to `path` atomically (temp file in the same directory, then rename).
    fn write_file(&self, bytes: &[u8], path: &Path) -> Result<(), SheetError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Built-in `.xlsx` writer backed by `rust_xlsxwriter`.
#[cfg(feature = "xlsx")]
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxSheetWriter;

#[cfg(feature = "xlsx")]
impl SheetWriter for XlsxSheetWriter {
    fn build_sheet(&self, report: &Report) -> Result<Vec<u8>, SheetError> {
        use rust_xlsxwriter::{Format, Workbook};

        let bold = Format::new().set_bold();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(report.sheet_name.as_str())?;
        sheet.set_column_width(0, 22)?;
        sheet.set_column_width(1, 16)?;
        sheet.set_column_width(2, 60)?;

        for (r, row) in report.grid().iter().enumerate() {
            let emphasise = r == 0 || r == Report::COLUMN_HEADER_ROW;
            let r = u32::try_from(r)?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)?;
                if emphasise {
                    sheet.write_string_with_format(r, c, cell.as_str(), &bold)?;
                } else {
                    sheet.write_string(r, c, cell.as_str())?;
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    fn name(&self) -> &'static str {
        "xlsx"
    }
}

/// Pick the injected writer, or fall back to the built-in one.
pub fn resolve_writer(
    injected: Option<&Arc<dyn SheetWriter>>,
) -> Result<Arc<dyn SheetWriter>, String> {
    if let Some(w) = injected {
        return Ok(Arc::clone(w));
    }
    #[cfg(feature = "xlsx")]
    {
        Ok(Arc::new(XlsxSheetWriter))
    }
    #[cfg(not(feature = "xlsx"))]
    {
        Err("no spreadsheet writer available; enable the `xlsx` feature or inject one".into())
    }
}

/// Build the workbook bytes without touching the file system.
pub async fn render(report: Report, writer: Arc<dyn SheetWriter>) -> Result<(Report, Vec<u8>), VerificaError> {
    let path = PathBuf::from(&report.filename);
    tokio::task::spawn_blocking(move || {
        let bytes = writer.build_sheet(&report)?;
        Ok::<_, SheetError>((report, bytes))
    })
    .await
    .map_err(|e| report_error(&path, format!("writer task failed: {e}")))?
    .map_err(|e| report_error(&path, e.to_string()))
}

/// Build the workbook and write it into `dir`. Returns the written path.
pub async fn emit(
    report: Report,
    writer: Arc<dyn SheetWriter>,
    dir: &Path,
) -> Result<PathBuf, VerificaError> {
    let path = dir.join(&report.filename);
    let target = path.clone();
    info!("Writing report with {} writer: {}", writer.name(), path.display());

    let written = tokio::task::spawn_blocking(move || {
        let bytes = writer.build_sheet(&report)?;
        writer.write_file(&bytes, &target)?;
        Ok::<_, SheetError>(bytes.len())
    })
    .await
    .map_err(|e| report_error(&path, format!("writer task failed: {e}")))?
    .map_err(|e| report_error(&path, e.to_string()))?;

    debug!("Report written: {} bytes", written);
    Ok(path)
}

fn report_error(path: &Path, detail: String) -> VerificaError {
    VerificaError::ReportGeneration {
        path: path.to_path_buf(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DocumentOutcome;

    fn scenario() -> ConformityResult {
        let doc = |conforme, note: &str| DocumentOutcome {
            conforme,
            note: note.into(),
        };
        ConformityResult::new(
            false,
            vec![
                ("visura".into(), doc(true, "ok")),
                ("durc".into(), doc(false, "scaduto")),
                ("dvr".into(), doc(true, "ok")),
                ("patente".into(), doc(true, "ok")),
            ],
            "verificare DURC",
        )
    }

    fn context() -> AnalysisRequestContext {
        AnalysisRequestContext::new("Acme Srl")
            .committente("Comune di Roma")
            .site_name("Scuola Verdi")
    }

    #[test]
    fn header_block_layout() {
        let report = Report::build(&scenario(), &context());
        assert_eq!(report.header.len(), Report::HEADER_ROWS);
        assert_eq!(report.header[0], vec!["REPORT VERIFICA ITP"]);
        assert_eq!(report.header[1], vec!["Impresa", "Acme Srl"]);
        assert_eq!(report.header[2], vec!["Committente", "Comune di Roma"]);
        assert_eq!(report.header[3], vec!["Cantiere", "Scuola Verdi"]);
        assert_eq!(report.header[4], vec!["Indirizzo", ""]);
        assert_eq!(report.header[5], vec![""]);
        assert_eq!(report.header[6], vec!["Documento", "Esito", "Note"]);
    }

    #[test]
    fn one_row_per_document_with_two_valued_outcome() {
        let result = scenario();
        let report = Report::build(&result, &context());
        assert_eq!(report.rows.len(), 4);
        for (row, (_, outcome)) in report.rows.iter().zip(&result.documenti) {
            let expected = if outcome.conforme { "OK" } else { "NON CONFORME" };
            assert_eq!(row.outcome, expected);
        }
        assert_eq!(
            report.rows[1],
            ReportRow {
                label: "DURC".into(),
                outcome: "NON CONFORME".into(),
                note: "scaduto".into(),
            }
        );
        assert_eq!(report.grid().len(), Report::HEADER_ROWS + 4);
    }

    #[test]
    fn filename_collapses_whitespace() {
        assert_eq!(report_filename("Acme Srl"), "Verifica_Acme_Srl.xlsx");
        assert_eq!(report_filename("Acme \t  Costruzioni Srl"), "Verifica_Acme_Costruzioni_Srl.xlsx");
        assert_eq!(report_filename("A/B Srl"), "Verifica_A_B_Srl.xlsx");
    }

    struct FailingWriter;

    impl SheetWriter for FailingWriter {
        fn build_sheet(&self, _report: &Report) -> Result<Vec<u8>, SheetError> {
            Err("unsupported environment".into())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct PanickingWriter;

    impl SheetWriter for PanickingWriter {
        fn build_sheet(&self, _report: &Report) -> Result<Vec<u8>, SheetError> {
            panic!("writer exploded")
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn writer_failure_becomes_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::build(&scenario(), &context());
        let err = emit(report, Arc::new(FailingWriter), dir.path())
            .await
            .unwrap_err();
        match err {
            VerificaError::ReportGeneration { path, detail } => {
                assert!(path.ends_with("Verifica_Acme_Srl.xlsx"));
                assert!(detail.contains("unsupported environment"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!dir.path().join("Verifica_Acme_Srl.xlsx").exists());
    }

    #[tokio::test]
    async fn writer_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::build(&scenario(), &context());
        let err = emit(report, Arc::new(PanickingWriter), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, VerificaError::ReportGeneration { .. }));
    }

    #[test]
    fn injected_writer_takes_precedence() {
        let injected: Arc<dyn SheetWriter> = Arc::new(FailingWriter);
        let w = resolve_writer(Some(&injected)).unwrap();
        assert_eq!(w.name(), "failing");
    }

    #[cfg(feature = "xlsx")]
    #[tokio::test]
    async fn xlsx_writer_produces_zip_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report::build(&scenario(), &context());
        let path = emit(report, Arc::new(XlsxSheetWriter), dir.path())
            .await
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(path.file_name().unwrap(), "Verifica_Acme_Srl.xlsx");
    }
}
