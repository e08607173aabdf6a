//! Evaluation prompt sent alongside the documents.
//!
//! The prompt names the company, lists the required checks with their
//! acceptance criteria, and pins the JSON shape the normaliser expects.
//! Callers can replace it via [`crate::config::AnalysisConfig::prompt_override`].

/// A document category the model must rule on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredCheck {
    /// Key used in the `documenti` object.
    pub key: &'static str,
    /// Label used inside the prompt.
    pub label: &'static str,
    /// Acceptance criterion.
    pub criterion: &'static str,
}

/// Checks requested from the model, in prompt order.
pub const REQUIRED_CHECKS: [RequiredCheck; 4] = [
    RequiredCheck {
        key: "visura",
        label: "Visura",
        criterion: "entro 6 mesi",
    },
    RequiredCheck {
        key: "durc",
        label: "DURC",
        criterion: "in corso di validità",
    },
    RequiredCheck {
        key: "dvr",
        label: "DVR",
        criterion: "presenza firme DL, RSPP, Medico, RLS",
    },
    RequiredCheck {
        key: "patente",
        label: "Patente a crediti",
        criterion: "in corso di validità",
    },
];

/// Placeholder substituted with the company name in prompt overrides.
pub const COMPANY_PLACEHOLDER: &str = "{company}";

/// JSON skeleton the model must answer with.
pub const RESPONSE_SCHEMA: &str = r#"{
  "conformita_generale": true,
  "documenti": {
    "visura": {"conforme": true, "note": "..."},
    "durc": {"conforme": true, "note": "..."},
    "dvr": {"conforme": true, "note": "..."},
    "patente": {"conforme": true, "note": "..."}
  },
  "note_finali": "..."
}"#;

/// Build the evaluation prompt for `company_name`.
pub fn evaluation_prompt(company_name: &str) -> String {
    let checks = REQUIRED_CHECKS
        .iter()
        .map(|c| format!("{} ({})", c.label, c.criterion))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analizza i documenti dell'impresa {company}.\n\
         Verifica: {checks}.\n\
         Rispondi SOLO con un JSON così strutturato:\n{schema}",
        company = company_name.trim(),
        checks = checks,
        schema = RESPONSE_SCHEMA,
    )
}

/// Apply a caller-supplied prompt template.
pub fn render_override(template: &str, company_name: &str) -> String {
    template.replace(COMPANY_PLACEHOLDER, company_name.trim())
}
