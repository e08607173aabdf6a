//! Inference request: prompt + encoded documents → model text.
//!
//! One request carries the evaluation prompt and every document as inline
//! parts. The network call sits behind [`InferenceBackend`] so tests and
//! embedding applications can substitute their own transport; [`GeminiClient`]
//! is the HTTP implementation.
//!
//! There is no retry here. A failed analysis is re-run explicitly by the user.

use crate::config::AnalysisConfig;
use crate::error::VerificaError;
use crate::pipeline::encode::EncodedPart;
use crate::prompts;
use crate::session::AnalysisRequestContext;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

// ── Request body ─────────────────────────────────────────────────────────

/// `{ "contents": [ { "parts": [ … ] } ] }`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// A single request part: either prompt text or an inline document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: EncodedPart,
    },
}

impl GenerateContentRequest {
    /// Prompt first, then documents in the given order.
    pub fn new(prompt: String, documents: Vec<EncodedPart>) -> Self {
        let mut parts = Vec::with_capacity(documents.len() + 1);
        parts.push(Part::Text { text: prompt });
        parts.extend(
            documents
                .into_iter()
                .map(|inline_data| Part::InlineData { inline_data }),
        );
        Self {
            contents: vec![Content { parts }],
        }
    }

    /// Total number of parts across all contents.
    pub fn part_count(&self) -> usize {
        self.contents.iter().map(|c| c.parts.len()).sum()
    }
}

/// Build the request for `context`, honouring any prompt override.
pub fn build_request(
    context: &AnalysisRequestContext,
    documents: Vec<EncodedPart>,
    config: &AnalysisConfig,
) -> GenerateContentRequest {
    let prompt = match config.prompt_override {
        Some(ref template) => prompts::render_override(template, &context.company_name),
        None => prompts::evaluation_prompt(&context.company_name),
    };
    GenerateContentRequest::new(prompt, documents)
}

// ── Backend seam ─────────────────────────────────────────────────────────

/// Transport that delivers a [`GenerateContentRequest`] and returns the
/// provider's JSON response body, error bodies included.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, request: &GenerateContentRequest) -> Result<Value, VerificaError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
///
/// An explicit `error` object wins over everything else and its `message` is
/// surfaced verbatim.
pub fn extract_text(response: &Value) -> Result<String, VerificaError> {
    if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(VerificaError::InferenceService { message });
    }

    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .map(|r| format!(" (prompt blocked: {r})"))
                .unwrap_or_default();
            VerificaError::MalformedResponse(format!("response has no candidates{reason}"))
        })?;

    candidate
        .pointer("/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            let finish = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .map(|r| format!(" (finishReason: {r})"))
                .unwrap_or_default();
            VerificaError::MalformedResponse(format!(
                "first candidate has no text part{finish}"
            ))
        })
}

/// Send one request through `backend` and return the model's text.
pub async fn request_analysis(
    backend: &dyn InferenceBackend,
    request: &GenerateContentRequest,
) -> Result<String, VerificaError> {
    info!(
        "Sending {} part(s) to {}",
        request.part_count(),
        backend.name()
    );
    let response = backend.generate(request).await?;
    let text = extract_text(&response)?;
    debug!("Received {} chars of model text", text.len());
    Ok(text)
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// `generateContent` client for the Generative Language API.
///
/// The API key travels as the `key` query parameter. reqwest errors are
/// stripped of their URL before being reported so the key never reaches logs.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    url: reqwest::Url,
    model: String,
}

impl GeminiClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, VerificaError> {
        let raw = format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        );
        let mut url = reqwest::Url::parse(&raw).map_err(|e| {
            VerificaError::Configuration(format!("invalid inference endpoint '{raw}': {e}"))
        })?;
        url.query_pairs_mut().append_pair("key", api_key);

        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| VerificaError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            url,
            model: model.to_string(),
        })
    }

    /// Build a client from `config`, resolving the API key now.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, VerificaError> {
        let api_key = config.resolve_api_key()?;
        Self::new(
            &config.endpoint,
            &config.model,
            &api_key,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn generate(&self, request: &GenerateContentRequest) -> Result<Value, VerificaError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| VerificaError::RequestFailed {
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| VerificaError::RequestFailed {
                reason: e.without_url().to_string(),
            })?;
        debug!("{} responded HTTP {} ({} bytes)", self.model, status, body.len());

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => {
                let has_error = value.get("error").is_some_and(|e| !e.is_null());
                if !status.is_success() && !has_error {
                    return Err(VerificaError::InferenceService {
                        message: format!("HTTP {status}"),
                    });
                }
                Ok(value)
            }
            Err(e) if status.is_success() => Err(VerificaError::MalformedResponse(format!(
                "response body is not JSON: {e}"
            ))),
            Err(_) => Err(VerificaError::InferenceService {
                message: format!("HTTP {status}"),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_matches_wire_shape() {
        let req = GenerateContentRequest::new(
            "prompt".into(),
            vec![EncodedPart::from_bytes(b"a"), EncodedPart::from_bytes(b"b")],
        );
        assert_eq!(req.part_count(), 3);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["contents"][0]["parts"][0], json!({"text": "prompt"}));
        assert_eq!(
            v["contents"][0]["parts"][1],
            json!({"inlineData": {"data": "YQ==", "mimeType": "application/pdf"}})
        );
        assert_eq!(v["contents"][0]["parts"][2]["inlineData"]["data"], "Yg==");
    }

    #[test]
    fn build_request_uses_override() {
        let ctx = AnalysisRequestContext::new("Acme Srl");
        let config = AnalysisConfig::builder()
            .prompt_override("Solo {company}")
            .build()
            .unwrap();
        let req = build_request(&ctx, vec![], &config);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "Solo Acme Srl");
    }

    #[test]
    fn extract_first_candidate_text() {
        let body = json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}, {"text": "second"}]}},
                {"content": {"parts": [{"text": "other"}]}}
            ]
        });
        assert_eq!(extract_text(&body).unwrap(), "first");
    }

    #[test]
    fn explicit_error_is_surfaced_verbatim() {
        let body = json!({"error": {"code": 429, "message": "quota exceeded"}});
        match extract_text(&body) {
            Err(VerificaError::InferenceService { message }) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn null_error_is_ignored() {
        let body = json!({"error": null, "candidates": [{"content": {"parts": [{"text": "x"}]}}]});
        assert_eq!(extract_text(&body).unwrap(), "x");
    }

    #[test]
    fn missing_candidates_is_malformed() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        match extract_text(&body) {
            Err(VerificaError::MalformedResponse(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            extract_text(&json!({"candidates": []})),
            Err(VerificaError::MalformedResponse(_))
        ));
    }

    #[test]
    fn candidate_without_parts_is_malformed() {
        let body = json!({"candidates": [{"finishReason": "MAX_TOKENS", "content": {}}]});
        match extract_text(&body) {
            Err(VerificaError::MalformedResponse(msg)) => assert!(msg.contains("MAX_TOKENS")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn client_url_carries_key_and_model() {
        let c = GeminiClient::new(
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.0-flash",
            "k123",
            None,
        )
        .unwrap();
        assert_eq!(
            c.url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=k123"
        );
    }

    #[test]
    fn client_from_config_without_key_fails_fast() {
        let config = AnalysisConfig::builder()
            .api_key("   ")
            .api_key_env(["VERIFICA_ITP_UNIT_TEST_UNSET_KEY"])
            .build()
            .unwrap();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(VerificaError::Configuration(_))
        ));
    }
}
