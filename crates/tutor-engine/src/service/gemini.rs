use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;
use tutor_contracts::turns::{ImageAttachment, RequestHistoryEntry, Role};

use super::{ChatHandle, CompletionService, ModelOptions};
use crate::config::TutorConfig;
use crate::error::ServiceError;

const PROVIDER: &str = "gemini";

pub struct GeminiService {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiService {
    pub fn new(config: &TutorConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<String, ServiceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ServiceError::NotConfigured {
                provider: PROVIDER.to_string(),
                message: "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            });
        };
        let endpoint = self.endpoint_for_model(model);
        debug!(%endpoint, "sending Gemini generateContent request");

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(payload)
            .send()
            .map_err(|err| ServiceError::Transport {
                provider: PROVIDER.to_string(),
                message: err.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response.text().map_err(|err| ServiceError::Transport {
            provider: PROVIDER.to_string(),
            message: format!("response body read failed: {}", err.without_url()),
        })?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        let parsed: Value =
            serde_json::from_str(&body).map_err(|err| ServiceError::InvalidPayload {
                provider: PROVIDER.to_string(),
                message: err.to_string(),
            })?;
        extract_response_text(&parsed)
    }
}

impl CompletionService for GeminiService {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn generate(
        &self,
        options: &ModelOptions,
        text: &str,
        image: &ImageAttachment,
    ) -> Result<String, ServiceError> {
        let payload = build_payload(&options.system_instruction, vec![image_content(text, image)]);
        self.generate_content(&options.model, &payload)
    }

    fn start_chat<'a>(
        &'a self,
        options: &ModelOptions,
        history: Vec<RequestHistoryEntry>,
    ) -> Box<dyn ChatHandle + 'a> {
        Box::new(GeminiChat {
            service: self,
            options: options.clone(),
            history,
        })
    }
}

struct GeminiChat<'a> {
    service: &'a GeminiService,
    options: ModelOptions,
    history: Vec<RequestHistoryEntry>,
}

impl ChatHandle for GeminiChat<'_> {
    fn history(&self) -> &[RequestHistoryEntry] {
        &self.history
    }

    fn send(&mut self, text: &str) -> Result<String, ServiceError> {
        let live = RequestHistoryEntry::new(Role::User, text);
        let contents = self
            .history
            .iter()
            .chain(std::iter::once(&live))
            .map(history_content)
            .collect::<Vec<Value>>();
        let payload = build_payload(&self.options.system_instruction, contents);
        let reply = self.service.generate_content(&self.options.model, &payload)?;
        self.history.push(live);
        self.history
            .push(RequestHistoryEntry::new(Role::Model, reply.clone()));
        Ok(reply)
    }
}

pub(crate) fn build_payload(system_instruction: &str, contents: Vec<Value>) -> Value {
    let mut payload = json!({ "contents": contents });
    if !system_instruction.trim().is_empty() {
        payload["systemInstruction"] = json!({
            "parts": [{ "text": system_instruction }],
        });
    }
    payload
}

pub(crate) fn history_content(entry: &RequestHistoryEntry) -> Value {
    json!({
        "role": entry.role.as_str(),
        "parts": entry
            .parts
            .iter()
            .map(|part| json!({ "text": part }))
            .collect::<Vec<Value>>(),
    })
}

pub(crate) fn image_content(text: &str, image: &ImageAttachment) -> Value {
    json!({
        "role": Role::User.as_str(),
        "parts": [
            { "text": text },
            {
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            },
        ],
    })
}

/// Joins the text parts of the first candidate.
pub(crate) fn extract_response_text(payload: &Value) -> Result<String, ServiceError> {
    let no_text = |reason: String| ServiceError::NoText {
        provider: PROVIDER.to_string(),
        reason,
    };

    if let Some(block_reason) = payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        return Err(no_text(format!("prompt blocked ({block_reason})")));
    }

    let Some(candidate) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        return Err(no_text("response has no candidates".to_string()));
    };

    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(no_text(format!(
            "candidate has no text (finishReason {finish_reason})"
        )));
    }
    Ok(text)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
