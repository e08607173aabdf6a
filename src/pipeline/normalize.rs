//! Result normalisation: model text → validated [`ConformityResult`].
//!
//! The provider is outside our control and routinely wraps JSON in Markdown
//! fences despite the prompt. Fences are stripped, then the text is parsed as
//! untyped JSON and every field the result needs is checked explicitly. Any
//! deviation is an error; nothing is defaulted.
//!
//! ## Rules
//!
//! 1. A leading ```` ``` ```` / ```` ```json ```` marker and a trailing ```` ``` ````
//!    marker are removed, either one alone or both (idempotent on clean text)
//! 2. The remainder must parse as JSON → otherwise [`VerificaError::ResultParse`]
//! 3. Top level must be an object with boolean `conformita_generale`,
//!    object `documenti` and string `note_finali` → otherwise [`VerificaError::ResultShape`]
//! 4. Each `documenti` entry must be an object with boolean `conforme` and a
//!    `note` that is a string or `null` (read as empty)
//! 5. `visura`, `durc`, `dvr`, `patente` must all be present; extra keys pass through

use crate::error::VerificaError;
use crate::output::{ConformityResult, DocumentOutcome, REQUIRED_DOCUMENTS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A```[A-Za-z0-9_+-]*[ \t]*").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*```\z").unwrap());

/// Remove a leading ```` ```<tag> ```` marker and a trailing ```` ``` ````
/// marker, each independently, and trim surrounding whitespace.
///
/// Backticks inside the text are left alone.
pub fn strip_code_fences(raw: &str) -> String {
    let text = RE_LEADING_FENCE.replace(raw.trim(), "");
    let text = RE_TRAILING_FENCE.replace(text.trim(), "");
    text.trim().to_string()
}

/// Parse and validate model text into a [`ConformityResult`].
pub fn normalize(raw: &str) -> Result<ConformityResult, VerificaError> {
    let clean = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(&clean).map_err(|e| VerificaError::ResultParse {
            detail: e.to_string(),
            raw: raw.to_string(),
        })?;

    let root = value
        .as_object()
        .ok_or_else(|| shape(format!("expected a JSON object, got {}", kind(&value))))?;

    let conformita_generale = require_bool(root, "conformita_generale", "top level")?;
    let note_finali = require_string(root, "note_finali", "top level")?;

    let documenti = root
        .get("documenti")
        .ok_or_else(|| shape("missing key 'documenti'"))?
        .as_object()
        .ok_or_else(|| shape("'documenti' must be an object"))?;

    let mut entries = Vec::with_capacity(documenti.len());
    for (key, entry) in documenti {
        let where_ = format!("documenti.{key}");
        let obj = entry
            .as_object()
            .ok_or_else(|| shape(format!("'{where_}' must be an object, got {}", kind(entry))))?;
        let conforme = require_bool(obj, "conforme", &where_)?;
        let note = match obj.get("note") {
            Some(Value::Null) => String::new(),
            _ => require_string(obj, "note", &where_)?,
        };
        entries.push((key.clone(), DocumentOutcome { conforme, note }));
    }

    let missing: Vec<&str> = REQUIRED_DOCUMENTS
        .iter()
        .copied()
        .filter(|k| !documenti.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(shape(format!(
            "'documenti' is missing required document(s): {}",
            missing.join(", ")
        )));
    }

    let result = ConformityResult::new(conformita_generale, entries, note_finali);
    let failing = result.non_conforming();
    if conformita_generale && !failing.is_empty() {
        warn!(
            "Model reports overall conformity but {} is non-conforming",
            failing.join(", ")
        );
    }
    Ok(result)
}

fn shape(msg: impl Into<String>) -> VerificaError {
    VerificaError::ResultShape(msg.into())
}

fn require_bool(obj: &Map<String, Value>, key: &str, where_: &str) -> Result<bool, VerificaError> {
    match obj.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(shape(format!(
            "'{key}' in {where_} must be a boolean, got {}",
            kind(other)
        ))),
        None => Err(shape(format!("missing key '{key}' in {where_}"))),
    }
}

fn require_string(
    obj: &Map<String, Value>,
    key: &str,
    where_: &str,
) -> Result<String, VerificaError> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(shape(format!(
            "'{key}' in {where_} must be a string, got {}",
            kind(other)
        ))),
        None => Err(shape(format!("missing key '{key}' in {where_}"))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{"conformita_generale":false,"documenti":{"visura":{"conforme":true,"note":"ok"},"durc":{"conforme":false,"note":"scaduto"},"dvr":{"conforme":true,"note":"ok"},"patente":{"conforme":true,"note":"ok"}},"note_finali":"verificare DURC"}"#;

    fn expect_shape(raw: &str) -> String {
        match normalize(raw) {
            Err(VerificaError::ResultShape(msg)) => msg,
            other => panic!("expected ResultShape, got {other:?}"),
        }
    }

    #[test]
    fn test_strip_fences_json_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fences_no_tag() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fences_single_line() {
        assert_eq!(strip_code_fences("```json {\"a\":1} ```"), "{\"a\":1}");
    }

    #[test]
    fn test_leading_fence_only() {
        let opened = format!("```json\n{SCENARIO}\n");
        assert_eq!(normalize(&opened).unwrap(), normalize(SCENARIO).unwrap());
    }

    #[test]
    fn test_trailing_fence_only() {
        let closed = format!("{SCENARIO}\n```");
        assert_eq!(normalize(&closed).unwrap(), normalize(SCENARIO).unwrap());
    }

    #[test]
    fn test_inner_backticks_untouched() {
        assert_eq!(
            strip_code_fences("```json\n{\"a\":\"x ``` y\"}\n```"),
            "{\"a\":\"x ``` y\"}"
        );
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_code_fences("```json\n{\"a\":1}\n```");
        assert_eq!(strip_code_fences(&once), once);
    }

    #[test]
    fn test_fenced_and_clean_parse_identically() {
        let fenced = format!("```json\n{SCENARIO}\n```");
        assert_eq!(normalize(&fenced).unwrap(), normalize(SCENARIO).unwrap());
        let crlf = format!("```JSON\r\n{SCENARIO}\r\n```\r\n");
        assert_eq!(normalize(&crlf).unwrap(), normalize(SCENARIO).unwrap());
    }

    #[test]
    fn test_scenario_result() {
        let r = normalize(SCENARIO).unwrap();
        assert!(!r.conformita_generale);
        assert_eq!(r.non_conforming(), vec!["durc"]);
        assert_eq!(r.document("durc").unwrap().note, "scaduto");
        assert_eq!(r.note_finali, "verificare DURC");
        let keys: Vec<&str> = r.documenti.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["visura", "durc", "dvr", "patente"]);
    }

    #[test]
    fn test_extra_keys_pass_through() {
        let raw = SCENARIO.replace(
            r#""patente":{"conforme":true,"note":"ok"}"#,
            r#""patente":{"conforme":true,"note":"ok"},"art14":{"conforme":false,"note":"assente"}"#,
        );
        let r = normalize(&raw).unwrap();
        assert_eq!(r.documenti.len(), 5);
        assert_eq!(r.extra_documents(), vec!["art14"]);
    }

    #[test]
    fn test_truncated_json_is_parse_error() {
        let truncated = &SCENARIO[..SCENARIO.len() / 2];
        match normalize(truncated) {
            Err(VerificaError::ResultParse { raw, .. }) => assert_eq!(raw, truncated),
            other => panic!("expected ResultParse, got {other:?}"),
        }
    }

    #[test]
    fn test_prose_is_parse_error() {
        assert!(matches!(
            normalize("I could not read the documents."),
            Err(VerificaError::ResultParse { .. })
        ));
    }

    #[test]
    fn test_missing_documenti() {
        let msg = expect_shape(r#"{"conformita_generale":true,"note_finali":""}"#);
        assert!(msg.contains("documenti"));
    }

    #[test]
    fn test_documenti_not_object() {
        let msg = expect_shape(r#"{"conformita_generale":true,"documenti":[],"note_finali":""}"#);
        assert!(msg.contains("must be an object"));
    }

    #[test]
    fn test_string_boolean_rejected() {
        let raw = SCENARIO.replace(r#""conforme":false"#, r#""conforme":"false""#);
        let msg = expect_shape(&raw);
        assert!(msg.contains("documenti.durc"), "got: {msg}");
    }

    #[test]
    fn test_null_conformita_generale_rejected() {
        let raw = SCENARIO.replace(r#""conformita_generale":false"#, r#""conformita_generale":null"#);
        let msg = expect_shape(&raw);
        assert!(msg.contains("conformita_generale"));
    }

    #[test]
    fn test_missing_required_document() {
        let raw = SCENARIO.replace(r#""dvr":{"conforme":true,"note":"ok"},"#, "");
        let msg = expect_shape(&raw);
        assert!(msg.contains("dvr"), "got: {msg}");
    }

    #[test]
    fn test_missing_note_rejected() {
        let raw = SCENARIO.replace(r#""note":"scaduto""#, r#""nota":"scaduto""#);
        let msg = expect_shape(&raw);
        assert!(msg.contains("'note'"));
    }

    #[test]
    fn test_null_note_reads_as_empty() {
        let raw = SCENARIO.replace(r#""note":"scaduto""#, r#""note":null"#);
        let r = normalize(&raw).unwrap();
        assert_eq!(r.document("durc").unwrap().note, "");
    }

    #[test]
    fn test_numeric_note_rejected() {
        let raw = SCENARIO.replace(r#""note":"scaduto""#, r#""note":3"#);
        let msg = expect_shape(&raw);
        assert!(msg.contains("must be a string"), "got: {msg}");
    }

    #[test]
    fn test_top_level_array_rejected() {
        let msg = expect_shape("[1,2,3]");
        assert!(msg.contains("array"));
    }
}
